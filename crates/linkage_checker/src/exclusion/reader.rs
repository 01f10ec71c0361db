use super::{ExclusionFileError, ExclusionRule, SourceMatcher, TargetMatcher};
use roxmltree::{Document, Node};

const ROOT: &str = "LinkageCheckerFilter";

pub(super) fn parse_document(document: &str) -> Result<Vec<ExclusionRule>, ExclusionFileError> {
    let document = Document::parse(document)?;
    let root = document.root_element();
    if root.tag_name().name() != ROOT {
        return Err(ExclusionFileError::UnexpectedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let mut rules = Vec::new();
    for node in elements(&root) {
        match node.tag_name().name() {
            "LinkageError" => rules.push(parse_rule(&node)?),
            other => return Err(unexpected(ROOT, other, &["LinkageError"])),
        }
    }
    Ok(rules)
}

fn parse_rule(node: &Node<'_, '_>) -> Result<ExclusionRule, ExclusionFileError> {
    let mut rule = ExclusionRule::default();
    let mut has_part = false;
    for child in elements(node) {
        match child.tag_name().name() {
            "Target" => {
                has_part = true;
                for matcher in elements(&child) {
                    rule.targets.push(parse_target(&matcher)?);
                }
            }
            "Source" => {
                has_part = true;
                for matcher in elements(&child) {
                    rule.sources.push(parse_source(&matcher)?);
                }
            }
            "Reason" => {
                rule.reason = child
                    .text()
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty());
            }
            other => {
                return Err(unexpected(
                    "LinkageError",
                    other,
                    &["Target", "Source", "Reason"],
                ));
            }
        }
    }
    if !has_part {
        return Err(ExclusionFileError::EmptyRule);
    }
    Ok(rule)
}

fn parse_target(node: &Node<'_, '_>) -> Result<TargetMatcher, ExclusionFileError> {
    match node.tag_name().name() {
        "Class" => Ok(TargetMatcher::Class {
            name: attribute(node, "name")?,
        }),
        "Package" => Ok(TargetMatcher::Package {
            name: attribute(node, "name")?,
        }),
        "Method" => Ok(TargetMatcher::Method {
            class_name: attribute(node, "className")?,
            name: attribute(node, "name")?,
        }),
        "Field" => Ok(TargetMatcher::Field {
            class_name: attribute(node, "className")?,
            name: attribute(node, "name")?,
        }),
        other => Err(unexpected(
            "Target",
            other,
            &["Class", "Method", "Field", "Package"],
        )),
    }
}

fn parse_source(node: &Node<'_, '_>) -> Result<SourceMatcher, ExclusionFileError> {
    match node.tag_name().name() {
        "Class" => Ok(SourceMatcher::Class {
            name: attribute(node, "name")?,
        }),
        "Package" => Ok(SourceMatcher::Package {
            name: attribute(node, "name")?,
        }),
        "Artifact" => SourceMatcher::artifact(&attribute(node, "name")?),
        other => Err(unexpected("Source", other, &["Class", "Package", "Artifact"])),
    }
}

fn elements<'a, 'input>(
    node: &Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(Node::is_element)
}

fn attribute(node: &Node<'_, '_>, name: &'static str) -> Result<String, ExclusionFileError> {
    node.attribute(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ExclusionFileError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute: name,
        })
}

fn unexpected(parent: &str, found: &str, expected: &[&str]) -> ExclusionFileError {
    ExclusionFileError::UnexpectedElement {
        parent: parent.to_string(),
        found: found.to_string(),
        expected: expected.join(", "),
    }
}
