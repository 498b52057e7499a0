//! Structured Prompt Content
//!
//! Tagged union of the four prompt shapes. The tag (`structureType`) returned
//! by the model must equal the requested structure type; anything else is a
//! validation failure rather than a silent coercion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Result, ValidationError, ValidationErrorKind};
use super::generation::StructureType;

/// JSON key carrying the structure tag
pub const STRUCTURE_TAG: &str = "structureType";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "structureType", rename_all = "lowercase")]
pub enum PromptContent {
    Standard { segments: Vec<Segment> },
    Structured { sections: Vec<Section> },
    Modulized { modules: Vec<Module> },
    Advanced { blocks: Vec<Block> },
}

impl PromptContent {
    pub fn structure_type(&self) -> StructureType {
        match self {
            PromptContent::Standard { .. } => StructureType::Standard,
            PromptContent::Structured { .. } => StructureType::Structured,
            PromptContent::Modulized { .. } => StructureType::Modulized,
            PromptContent::Advanced { .. } => StructureType::Advanced,
        }
    }

    /// Parse a model response into content of the expected shape.
    ///
    /// Checks the tag before deserializing so a well-formed response of the
    /// wrong shape is reported as a mismatch, not as a missing field.
    pub fn parse_expected(value: Value, expected: StructureType) -> Result<Self> {
        let tag = value
            .get(STRUCTURE_TAG)
            .ok_or_else(|| {
                ValidationError::new(ValidationErrorKind::MissingField, "response has no structure tag")
                    .with_field(STRUCTURE_TAG)
            })?
            .as_str()
            .ok_or_else(|| {
                ValidationError::new(ValidationErrorKind::Format, "structure tag is not a string")
                    .with_field(STRUCTURE_TAG)
            })?;

        if tag != expected.as_str() {
            return Err(ValidationError::new(
                ValidationErrorKind::TagMismatch,
                "response shape does not match the requested structure type",
            )
            .with_field(STRUCTURE_TAG)
            .with_comparison(expected.as_str(), tag)
            .into());
        }

        let content: PromptContent = serde_json::from_value(value)?;
        content.validate()?;
        Ok(content)
    }

    /// Every sequence must be non-empty and every text-bearing field non-blank.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        match self {
            PromptContent::Standard { segments } => {
                non_empty("segments", segments.len())?;
                for (i, segment) in segments.iter().enumerate() {
                    non_blank(&format!("segments[{i}].content"), &segment.content)?;
                }
            }
            PromptContent::Structured { sections } => {
                non_empty("sections", sections.len())?;
                for (i, section) in sections.iter().enumerate() {
                    non_blank(&format!("sections[{i}].title"), &section.title)?;
                    non_blank(&format!("sections[{i}].content"), &section.content)?;
                }
            }
            PromptContent::Modulized { modules } => {
                validate_modules("modules", modules)?;
            }
            PromptContent::Advanced { blocks } => {
                non_empty("blocks", blocks.len())?;
                for (i, block) in blocks.iter().enumerate() {
                    non_blank(&format!("blocks[{i}].name"), &block.name)?;
                    validate_modules(&format!("blocks[{i}].modules"), &block.modules)?;
                }
            }
        }
        Ok(())
    }

    /// Flatten the content into plain prompt text
    pub fn render_text(&self) -> String {
        match self {
            PromptContent::Standard { segments } => segments
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            PromptContent::Structured { sections } => sections
                .iter()
                .map(|s| format!("## {}\n{}", s.title, s.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
            PromptContent::Modulized { modules } => render_modules(modules, "##"),
            PromptContent::Advanced { blocks } => blocks
                .iter()
                .map(|b| format!("# {}\n\n{}", b.name, render_modules(&b.modules, "##")))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

fn render_modules(modules: &[Module], heading: &str) -> String {
    modules
        .iter()
        .map(|m| format!("{} {}\n{}", heading, m.name, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn validate_modules(field: &str, modules: &[Module]) -> std::result::Result<(), ValidationError> {
    non_empty(field, modules.len())?;
    for (i, module) in modules.iter().enumerate() {
        non_blank(&format!("{field}[{i}].name"), &module.name)?;
        non_blank(&format!("{field}[{i}].content"), &module.content)?;
    }
    Ok(())
}

fn non_empty(field: &str, len: usize) -> std::result::Result<(), ValidationError> {
    if len == 0 {
        return Err(ValidationError::new(ValidationErrorKind::Empty, "sequence is empty").with_field(field));
    }
    Ok(())
}

fn non_blank(field: &str, text: &str) -> std::result::Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::new(ValidationErrorKind::Empty, "text is blank").with_field(field));
    }
    Ok(())
}
