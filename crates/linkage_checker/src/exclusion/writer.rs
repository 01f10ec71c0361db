use super::{ExclusionFileError, ExclusionRule, SourceMatcher, TargetMatcher};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

pub(super) fn write_document(rules: &[ExclusionRule]) -> Result<String, ExclusionFileError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("LinkageCheckerFilter")))?;

    for rule in rules {
        writer.write_event(Event::Start(BytesStart::new("LinkageError")))?;
        if !rule.targets.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("Target")))?;
            for target in &rule.targets {
                write_target(&mut writer, target)?;
            }
            writer.write_event(Event::End(BytesEnd::new("Target")))?;
        }
        if !rule.sources.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("Source")))?;
            for source in &rule.sources {
                write_source(&mut writer, source)?;
            }
            writer.write_event(Event::End(BytesEnd::new("Source")))?;
        }
        if let Some(reason) = rule.reason.as_deref() {
            writer.write_event(Event::Start(BytesStart::new("Reason")))?;
            writer.write_event(Event::Text(BytesText::new(reason)))?;
            writer.write_event(Event::End(BytesEnd::new("Reason")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("LinkageError")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("LinkageCheckerFilter")))?;

    let mut document = String::from_utf8(writer.into_inner().into_inner())?;
    if !document.ends_with('\n') {
        document.push('\n');
    }
    Ok(document)
}

fn write_target(writer: &mut XmlWriter, target: &TargetMatcher) -> Result<(), ExclusionFileError> {
    let element = match target {
        TargetMatcher::Class { name } => {
            let mut element = BytesStart::new("Class");
            element.push_attribute(("name", name.as_str()));
            element
        }
        TargetMatcher::Package { name } => {
            let mut element = BytesStart::new("Package");
            element.push_attribute(("name", name.as_str()));
            element
        }
        TargetMatcher::Method { class_name, name } => {
            let mut element = BytesStart::new("Method");
            element.push_attribute(("className", class_name.as_str()));
            element.push_attribute(("name", name.as_str()));
            element
        }
        TargetMatcher::Field { class_name, name } => {
            let mut element = BytesStart::new("Field");
            element.push_attribute(("className", class_name.as_str()));
            element.push_attribute(("name", name.as_str()));
            element
        }
    };
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_source(writer: &mut XmlWriter, source: &SourceMatcher) -> Result<(), ExclusionFileError> {
    let element = match source {
        SourceMatcher::Class { name } => {
            let mut element = BytesStart::new("Class");
            element.push_attribute(("name", name.as_str()));
            element
        }
        SourceMatcher::Package { name } => {
            let mut element = BytesStart::new("Package");
            element.push_attribute(("name", name.as_str()));
            element
        }
        SourceMatcher::Artifact { .. } => {
            let coordinates = source.coordinates().unwrap_or_default();
            let mut element = BytesStart::new("Artifact");
            element.push_attribute(("name", coordinates.as_str()));
            element
        }
    };
    writer.write_event(Event::Empty(element))?;
    Ok(())
}
