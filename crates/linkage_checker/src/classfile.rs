use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("malformed descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("malformed bytecode: unknown opcode 0x{opcode:02x} at offset {offset}")]
    MalformedBytecode { opcode: u8, offset: usize },
}

/// Structural view of one class file. Class names are binary names (`a.b.C$D`).
#[derive(Debug, Clone)]
pub struct ParsedClass {
    pub binary_name: String,
    pub access_flags: u16,
    /// Flags recorded for this class in its own `InnerClasses` attribute. Nested classes
    /// carry their declared visibility here rather than in `access_flags`.
    pub inner_access_flags: Option<u16>,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub class_constants: Vec<ClassConstant>,
    pub member_references: Vec<MemberReference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub exceptions: Vec<String>,
    pub catch_types: Vec<String>,
}

impl MemberInfo {
    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & ACC_PRIVATE != 0
    }

    pub fn is_protected(&self) -> bool {
        self.access_flags & ACC_PROTECTED != 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }
}

/// A `CONSTANT_Class` entry. Array classes are recorded by their element class; primitive
/// arrays are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassConstant {
    pub name: String,
    /// Whether an instruction (`ldc`, `new`, `checkcast`, ...) refers to this constant.
    pub used_by_code: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberReference {
    pub kind: MemberKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl ParsedClass {
    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    pub fn is_final(&self) -> bool {
        self.access_flags & ACC_FINAL != 0
    }

    /// Visibility flags as the class was declared, preferring the `InnerClasses` entry.
    pub fn declared_access_flags(&self) -> u16 {
        self.inner_access_flags.unwrap_or(self.access_flags)
    }

    pub fn package_name(&self) -> &str {
        package_of(&self.binary_name)
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MemberInfo> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<&MemberInfo> {
        self.fields
            .iter()
            .find(|field| field.name == name && field.descriptor == descriptor)
    }

    /// Whether anything other than a bare constant pool entry refers to `class_name`:
    /// instructions, member references, member descriptors, throws clauses, catch
    /// clauses or supertypes.
    pub fn uses_class(&self, class_name: &str) -> bool {
        if self.super_class.as_deref() == Some(class_name)
            || self.interfaces.iter().any(|name| name == class_name)
        {
            return true;
        }
        if self
            .class_constants
            .iter()
            .any(|constant| constant.used_by_code && constant.name == class_name)
        {
            return true;
        }
        let internal = format!("L{};", class_name.replace('.', "/"));
        if self.member_references.iter().any(|reference| {
            reference.owner == class_name || reference.descriptor.contains(&internal)
        }) {
            return true;
        }
        self.fields.iter().chain(&self.methods).any(|member| {
            member.descriptor.contains(&internal)
                || member.exceptions.iter().any(|name| name == class_name)
                || member.catch_types.iter().any(|name| name == class_name)
        })
    }

    /// Whether any method of this class has an exception handler for one of `class_names`.
    pub fn catches_any(&self, class_names: &[&str]) -> bool {
        self.methods
            .iter()
            .flat_map(|method| &method.catch_types)
            .any(|caught| class_names.contains(&caught.as_str()))
    }
}

/// Package part of a binary class name; empty for the default package.
pub fn package_of(binary_name: &str) -> &str {
    binary_name
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or("")
}

/// Name of the top-level class enclosing `binary_name`.
pub fn outermost_class_name(binary_name: &str) -> &str {
    let simple_start = binary_name.rfind('.').map(|index| index + 1).unwrap_or(0);
    match binary_name[simple_start..].find('$') {
        Some(offset) if offset > 0 => &binary_name[..simple_start + offset],
        _ => binary_name,
    }
}

pub fn parse_class(bytes: &[u8]) -> Result<ParsedClass, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let _major_version = reader.read_u2()?;
    let constant_pool = ConstantPool::parse(&mut reader)?;

    let access_flags = reader.read_u2()?;
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;

    let binary_name = binary_name(&constant_pool.class_name(this_class)?);
    let super_class = if super_class == 0 {
        None
    } else {
        Some(binary_name_of_class(&constant_pool, super_class)?)
    };

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        interfaces.push(binary_name_of_class(&constant_pool, index)?);
    }

    let mut code_class_indices = HashSet::new();

    let fields_count = reader.read_u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(parse_member(
            &mut reader,
            &constant_pool,
            &mut code_class_indices,
        )?);
    }

    let methods_count = reader.read_u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(parse_member(
            &mut reader,
            &constant_pool,
            &mut code_class_indices,
        )?);
    }

    let mut inner_access_flags = None;
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let body = reader.read_slice(length)?;
        if constant_pool.utf8(name_index)? == "InnerClasses" {
            let mut attribute = ClassReader::new(body);
            let number_of_classes = attribute.read_u2()?;
            for _ in 0..number_of_classes {
                let inner_class_index = attribute.read_u2()?;
                let _outer_class_index = attribute.read_u2()?;
                let _inner_name_index = attribute.read_u2()?;
                let flags = attribute.read_u2()?;
                if inner_class_index == this_class {
                    inner_access_flags = Some(flags);
                }
            }
        }
    }

    let class_constants = constant_pool.class_constants(&code_class_indices)?;
    let member_references = constant_pool.member_references()?;

    Ok(ParsedClass {
        binary_name,
        access_flags,
        inner_access_flags,
        super_class,
        interfaces,
        fields,
        methods,
        class_constants,
        member_references,
    })
}

fn parse_member(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
    code_class_indices: &mut HashSet<u16>,
) -> Result<MemberInfo, ClassParseError> {
    let access_flags = reader.read_u2()?;
    let name_index = reader.read_u2()?;
    let descriptor_index = reader.read_u2()?;
    let mut member = MemberInfo {
        access_flags,
        name: constant_pool.utf8(name_index)?.to_string(),
        descriptor: constant_pool.utf8(descriptor_index)?.to_string(),
        exceptions: Vec::new(),
        catch_types: Vec::new(),
    };

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let body = reader.read_slice(length)?;
        match constant_pool.utf8(name_index)? {
            "Exceptions" => {
                let mut attribute = ClassReader::new(body);
                let count = attribute.read_u2()?;
                for _ in 0..count {
                    let index = attribute.read_u2()?;
                    member
                        .exceptions
                        .push(binary_name_of_class(constant_pool, index)?);
                }
            }
            "Code" => {
                parse_code(body, constant_pool, &mut member, code_class_indices)?;
            }
            _ => {}
        }
    }
    Ok(member)
}

fn parse_code(
    body: &[u8],
    constant_pool: &ConstantPool,
    member: &mut MemberInfo,
    code_class_indices: &mut HashSet<u16>,
) -> Result<(), ClassParseError> {
    let mut reader = ClassReader::new(body);
    let _max_stack = reader.read_u2()?;
    let _max_locals = reader.read_u2()?;
    let code_length = reader.read_u4()? as usize;
    let code = reader.read_slice(code_length)?;
    scan_instructions(code, constant_pool, code_class_indices)?;

    let exception_table_length = reader.read_u2()?;
    for _ in 0..exception_table_length {
        reader.skip(6)?; // start_pc, end_pc, handler_pc
        let catch_type = reader.read_u2()?;
        // 0 is a `finally` handler
        if catch_type != 0 {
            let caught = binary_name_of_class(constant_pool, catch_type)?;
            if !member.catch_types.contains(&caught) {
                member.catch_types.push(caught);
            }
        }
    }
    Ok(())
}

/// Walks the instruction stream and records every constant pool index an instruction uses as
/// a class operand.
fn scan_instructions(
    code: &[u8],
    constant_pool: &ConstantPool,
    code_class_indices: &mut HashSet<u16>,
) -> Result<(), ClassParseError> {
    let mut reader = ClassReader::new(code);
    while reader.remaining() > 0 {
        let offset = reader.position();
        let opcode = reader.read_u1()?;
        match opcode {
            // ldc
            0x12 => {
                let index = u16::from(reader.read_u1()?);
                record_class_operand(index, constant_pool, code_class_indices);
            }
            // ldc_w, new, anewarray, checkcast, instanceof
            0x13 | 0xbb | 0xbd | 0xc0 | 0xc1 => {
                let index = reader.read_u2()?;
                record_class_operand(index, constant_pool, code_class_indices);
            }
            // multianewarray
            0xc5 => {
                let index = reader.read_u2()?;
                record_class_operand(index, constant_pool, code_class_indices);
                reader.skip(1)?;
            }
            // tableswitch
            0xaa => {
                reader.skip(switch_padding(offset))?;
                reader.skip(4)?; // default
                let low = reader.read_u4()? as i32;
                let high = reader.read_u4()? as i32;
                let entries = i64::from(high) - i64::from(low) + 1;
                if entries < 0 {
                    return Err(ClassParseError::MalformedBytecode { opcode, offset });
                }
                reader.skip(entries as usize * 4)?;
            }
            // lookupswitch
            0xab => {
                reader.skip(switch_padding(offset))?;
                reader.skip(4)?; // default
                let pairs = reader.read_u4()? as i32;
                if pairs < 0 {
                    return Err(ClassParseError::MalformedBytecode { opcode, offset });
                }
                reader.skip(pairs as usize * 8)?;
            }
            // wide
            0xc4 => {
                let modified = reader.read_u1()?;
                reader.skip(if modified == 0x84 { 4 } else { 2 })?;
            }
            0x10 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => reader.skip(1)?,
            0x11 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xc6 | 0xc7 => reader.skip(2)?,
            0xb9 | 0xba | 0xc8 | 0xc9 => reader.skip(4)?,
            0x00..=0x0f
            | 0x1a..=0x35
            | 0x3b..=0x83
            | 0x85..=0x98
            | 0xac..=0xb1
            | 0xbe
            | 0xbf
            | 0xc2
            | 0xc3
            | 0xca
            | 0xfe
            | 0xff => {}
            _ => return Err(ClassParseError::MalformedBytecode { opcode, offset }),
        }
    }
    Ok(())
}

fn switch_padding(opcode_offset: usize) -> usize {
    (4 - (opcode_offset + 1) % 4) % 4
}

fn record_class_operand(index: u16, constant_pool: &ConstantPool, indices: &mut HashSet<u16>) {
    if matches!(constant_pool.get(index), Ok(Constant::Class { .. })) {
        indices.insert(index);
    }
}

fn binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

fn binary_name_of_class(constant_pool: &ConstantPool, index: u16) -> Result<String, ClassParseError> {
    Ok(binary_name(&constant_pool.class_name(index)?))
}

/// Element class of an array class name such as `[[Ljava/lang/String;`.
fn array_element_class(internal_name: &str) -> Option<&str> {
    let element = internal_name.trim_start_matches('[');
    element.strip_prefix('L')?.strip_suffix(';')
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class {
        name_index: u16,
    },
    MemberRef {
        kind: MemberKind,
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    // modified UTF-8; surrogate pairs and embedded NULs decode lossily
                    Constant::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                7 => {
                    let name_index = reader.read_u2()?;
                    Constant::Class { name_index }
                }
                8 | 16 | 19 | 20 => {
                    reader.read_u2()?;
                    Constant::Other
                }
                9 | 10 | 11 => {
                    let class_index = reader.read_u2()?;
                    let name_and_type_index = reader.read_u2()?;
                    let kind = match tag {
                        9 => MemberKind::Field,
                        10 => MemberKind::Method,
                        _ => MemberKind::InterfaceMethod,
                    };
                    Constant::MemberRef {
                        kind,
                        class_index,
                        name_and_type_index,
                    }
                }
                12 => {
                    let name_index = reader.read_u2()?;
                    let descriptor_index = reader.read_u2()?;
                    Constant::NameAndType {
                        name_index,
                        descriptor_index,
                    }
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                other => return Err(ClassParseError::UnsupportedConstant { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn class_constants(
        &self,
        code_class_indices: &HashSet<u16>,
    ) -> Result<Vec<ClassConstant>, ClassParseError> {
        let mut constants = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let Constant::Class { name_index } = entry else {
                continue;
            };
            let internal_name = self.utf8(*name_index)?;
            let name = if internal_name.starts_with('[') {
                match array_element_class(internal_name) {
                    Some(element) => binary_name(element),
                    None => continue,
                }
            } else {
                binary_name(internal_name)
            };
            let used_by_code = u16::try_from(index)
                .map(|index| code_class_indices.contains(&index))
                .unwrap_or(false);
            constants.push(ClassConstant { name, used_by_code });
        }
        Ok(constants)
    }

    fn member_references(&self) -> Result<Vec<MemberReference>, ClassParseError> {
        let mut references = Vec::new();
        for entry in &self.entries {
            let Constant::MemberRef {
                kind,
                class_index,
                name_and_type_index,
            } = entry
            else {
                continue;
            };
            let (name_index, descriptor_index) = match self.get(*name_and_type_index)? {
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => (*name_index, *descriptor_index),
                _ => {
                    return Err(ClassParseError::InvalidConstantIndex {
                        index: *name_and_type_index,
                    });
                }
            };
            references.push(MemberReference {
                kind: *kind,
                owner: binary_name(self.class_name(*class_index)?),
                name: self.utf8(name_index)?.to_string(),
                descriptor: self.utf8(descriptor_index)?.to_string(),
            });
        }
        Ok(references)
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        const MAGIC: u32 = 0xCAFEBABE;
        let magic = self.read_u4()?;
        if magic != MAGIC {
            return Err(ClassParseError::InvalidMagic);
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        let value = *self
            .data
            .get(self.pos)
            .ok_or(ClassParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(value)
    }

    fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        if len > self.remaining() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        self.read_slice(len).map(|_| ())
    }
}

/// A field type as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(&'static str),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// The class named by an object type, looking through arrays.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            FieldType::Primitive(_) => None,
            FieldType::Object(name) => Some(name.as_str()),
            FieldType::Array(element) => element.class_name(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(name) => f.write_str(name),
            FieldType::Object(name) => f.write_str(name),
            FieldType::Array(element) => write!(f, "{element}[]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ClassParseError> {
        parse_method_descriptor(descriptor)
    }

    /// Renders `name(int, java.lang.String[])`.
    pub fn render(&self, name: &str) -> String {
        let parameters = self
            .parameters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{name}({parameters})")
    }

    pub fn return_type_name(&self) -> String {
        self.return_type
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "void".to_string())
    }
}

/// The `(...)` part of a method descriptor, without the return type.
pub fn parameter_descriptor(descriptor: &str) -> &str {
    match descriptor.find(')') {
        Some(end) => &descriptor[..=end],
        None => descriptor,
    }
}

pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    let ty = parser.parse_type()?;
    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect('(')?;
    let mut parameters = Vec::new();
    while !parser.peek_char(')')? {
        parameters.push(parser.parse_type()?);
    }
    parser.expect(')')?;
    let return_type = if parser.peek_char('V')? {
        parser.advance(1);
        None
    } else {
        Some(parser.parse_type()?)
    };

    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }

    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

struct DescriptorParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(descriptor: &'a str) -> Self {
        Self {
            bytes: descriptor.as_bytes(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn expect(&mut self, ch: char) -> Result<(), ClassParseError> {
        if self.remaining() < 1 {
            return Err(ClassParseError::InvalidDescriptor(String::new()));
        }
        if self.bytes[self.pos] != ch as u8 {
            return Err(ClassParseError::InvalidDescriptor(format!(
                "expected '{}' in descriptor",
                ch
            )));
        }
        self.pos += 1;
        Ok(())
    }

    fn advance(&mut self, count: usize) {
        self.pos += count;
    }

    fn peek_char(&self, ch: char) -> Result<bool, ClassParseError> {
        if self.remaining() < 1 {
            return Err(ClassParseError::InvalidDescriptor(String::new()));
        }
        Ok(self.bytes[self.pos] == ch as u8)
    }

    fn parse_type(&mut self) -> Result<FieldType, ClassParseError> {
        if self.remaining() == 0 {
            return Err(ClassParseError::InvalidDescriptor(String::new()));
        }

        let start = self.bytes[self.pos];
        let primitive = match start {
            b'B' => "byte",
            b'C' => "char",
            b'D' => "double",
            b'F' => "float",
            b'I' => "int",
            b'J' => "long",
            b'S' => "short",
            b'Z' => "boolean",
            b'L' => return self.parse_reference_type(),
            b'[' => return self.parse_array_type(),
            _ => {
                return Err(ClassParseError::InvalidDescriptor(format!(
                    "unexpected descriptor tag '{}'",
                    start as char
                )));
            }
        };
        self.pos += 1;
        Ok(FieldType::Primitive(primitive))
    }

    fn parse_reference_type(&mut self) -> Result<FieldType, ClassParseError> {
        self.expect('L')?;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(ClassParseError::InvalidDescriptor(
                "unterminated reference descriptor".into(),
            ));
        }
        let name = String::from_utf8_lossy(&self.bytes[start..self.pos]).replace('/', ".");
        self.pos += 1; // consume ';'
        Ok(FieldType::Object(name))
    }

    fn parse_array_type(&mut self) -> Result<FieldType, ClassParseError> {
        self.expect('[')?;
        let element = self.parse_type()?;
        Ok(FieldType::Array(Box::new(element)))
    }
}
