//! Prompt Builder System
//!
//! Renders the system and user instructions sent to a completion backend.
//!
//! The system instruction fixes the model's role and the JSON shape it must
//! return (one schema template per structure type). The user instruction
//! carries the request itself: category, type, language, complexity, the
//! user's description and any attached file context.

use crate::ai::schema::{schema_for, shape_description};
use crate::types::{Complexity, GenerationConfig};

/// Accumulates prompt parts in order
///
/// Context items are collected separately and rendered as one block at the
/// position of the first item.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    parts: Vec<String>,
    context: Vec<(String, String)>,
    context_at: Option<usize>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(self, expertise: &str, task: &str) -> Self {
        self.push(format!(
            "<ROLE>\nYou are an expert {} specializing in {}.\n</ROLE>",
            expertise, task
        ))
    }

    pub fn objectives(self, objectives: Vec<&str>) -> Self {
        let numbered: Vec<String> = objectives
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}. {}", i + 1, o))
            .collect();
        self.push(format!("<OBJECTIVES>\n{}\n</OBJECTIVES>", numbered.join("\n")))
    }

    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        if self.context_at.is_none() {
            self.context_at = Some(self.parts.len());
            self.parts.push(String::new());
        }
        self.context.push((key.to_string(), value.to_string()));
        self
    }

    pub fn section(self, header: &str, content: &str) -> Self {
        self.push(format!("# {}\n\n{}", header, content))
    }

    pub fn text(self, content: &str) -> Self {
        self.push(content.to_string())
    }

    pub fn code(self, language: &str, content: &str) -> Self {
        self.push(format!("```{}\n{}\n```", language, content))
    }

    fn push(mut self, part: String) -> Self {
        self.parts.push(part);
        self
    }

    pub fn build(mut self) -> String {
        if let Some(at) = self.context_at {
            let lines: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("**{}**: {}", k, v))
                .collect();
            self.parts[at] = format!("# Context\n\n{}", lines.join("\n"));
        }
        self.parts.join("\n\n")
    }
}

/// System + user instruction pair for one completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Preset prompt templates
pub struct PromptTemplates;

impl PromptTemplates {
    /// Render the instruction pair for a generation request
    pub fn generation(config: &GenerationConfig) -> RenderedPrompt {
        RenderedPrompt {
            system: Self::system_instruction(config),
            user: Self::user_instruction(config),
        }
    }

    fn system_instruction(config: &GenerationConfig) -> String {
        let structure = config.structure_type;
        // Pretty-printing a json! literal cannot fail
        let schema = serde_json::to_string_pretty(&schema_for(structure)).unwrap_or_default();

        PromptBuilder::new()
            .role(
                "prompt engineer",
                "composing reusable, component-based prompts for AI assistants",
            )
            .objectives(vec![
                "Turn the user's description into a complete, ready-to-use prompt",
                "Keep every part concrete and free of filler",
                "Match the requested complexity, category, type and language",
            ])
            .section(
                "Output Format",
                &format!(
                    "Organise the prompt as {}. Set \"structureType\" to \"{}\".\n\
                     Respond ONLY with valid JSON matching this schema, no explanation:\n\n```json\n{}\n```",
                    shape_description(structure),
                    structure.as_str(),
                    schema
                ),
            )
            .build()
    }

    fn user_instruction(config: &GenerationConfig) -> String {
        let mut builder = PromptBuilder::new()
            .context_item("Category", &config.category)
            .context_item("Type", &config.prompt_type)
            .context_item("Language", &config.language)
            .context_item("Complexity", complexity_guidance(config.complexity))
            .section("Request", &config.user_input);

        if let Some(file_context) = config.file_context.as_deref() {
            builder = builder
                .text("Use the following file as reference material:")
                .code("", file_context);
        }

        builder.build()
    }
}

fn complexity_guidance(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Simple => "simple (short, a few focused parts)",
        Complexity::Medium => "medium (balanced detail)",
        Complexity::Complex => "complex (thorough, many detailed parts)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructureType;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("prompt engineer", "system prompts")
            .objectives(vec!["Be concise", "Be specific"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("prompt engineer"));
        assert!(prompt.contains("1. Be concise"));
        assert!(prompt.contains("2. Be specific"));
    }

    #[test]
    fn test_context_items_keep_order() {
        let prompt = PromptBuilder::new()
            .context_item("Category", "coding")
            .context_item("Language", "english")
            .build();

        let category = prompt.find("**Category**: coding").unwrap();
        let language = prompt.find("**Language**: english").unwrap();
        assert!(category < language);
        assert_eq!(prompt.matches("# Context").count(), 1);
    }

    #[test]
    fn test_generation_system_embeds_schema() {
        let config = GenerationConfig::new("Review pull requests", StructureType::Modulized);
        let rendered = PromptTemplates::generation(&config);

        assert!(rendered.system.contains("\"structureType\" to \"modulized\""));
        assert!(rendered.system.contains("```json"));
        assert!(rendered.system.contains("\"modules\""));
        assert!(!rendered.system.contains("Review pull requests"));
    }

    #[test]
    fn test_generation_user_includes_file_context() {
        let config = GenerationConfig::new("Explain this code", StructureType::Standard)
            .with_complexity(Complexity::Complex)
            .with_file_context("fn main() {}");
        let rendered = PromptTemplates::generation(&config);

        assert!(rendered.user.contains("# Request\n\nExplain this code"));
        assert!(rendered.user.contains("fn main() {}"));
        assert!(rendered.user.contains("complex (thorough"));
    }
}
