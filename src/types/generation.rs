//! Generation Request and Result Types

use serde::{Deserialize, Serialize};

use super::content::PromptContent;

/// Shape of a generated prompt's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StructureType {
    /// Flat list of text segments
    #[default]
    Standard,
    /// Titled sections
    Structured,
    /// Named modules
    Modulized,
    /// Blocks of named modules
    Advanced,
}

impl StructureType {
    pub const ALL: [StructureType; 4] = [
        StructureType::Standard,
        StructureType::Structured,
        StructureType::Modulized,
        StructureType::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Standard => "standard",
            StructureType::Structured => "structured",
            StructureType::Modulized => "modulized",
            StructureType::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for StructureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StructureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(StructureType::Standard),
            "structured" => Ok(StructureType::Structured),
            "modulized" => Ok(StructureType::Modulized),
            "advanced" => Ok(StructureType::Advanced),
            _ => Err(format!(
                "Unknown structure type: {}. Valid values: standard, structured, modulized, advanced",
                s
            )),
        }
    }
}

/// Requested complexity of the generated prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "medium" => Ok(Complexity::Medium),
            "complex" => Ok(Complexity::Complex),
            _ => Err(format!(
                "Unknown complexity: {}. Valid values: simple, medium, complex",
                s
            )),
        }
    }
}

/// Immutable input to one generation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Free-form description of the prompt the user wants
    pub user_input: String,
    pub structure_type: StructureType,
    pub complexity: Complexity,
    pub category: String,
    /// Prompt type (e.g. "system", "task")
    #[serde(rename = "type")]
    pub prompt_type: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_context: Option<String>,
}

impl GenerationConfig {
    pub fn new(user_input: impl Into<String>, structure_type: StructureType) -> Self {
        Self {
            user_input: user_input.into(),
            structure_type,
            complexity: Complexity::default(),
            category: "general".to_string(),
            prompt_type: "task".to_string(),
            language: "english".to_string(),
            file_context: None,
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_type(mut self, prompt_type: impl Into<String>) -> Self {
        self.prompt_type = prompt_type.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_file_context(mut self, file_context: impl Into<String>) -> Self {
        self.file_context = Some(file_context.into());
        self
    }

    /// Billable input length in characters (user input plus file context)
    pub fn prompt_length(&self) -> usize {
        self.user_input.chars().count()
            + self
                .file_context
                .as_deref()
                .map(|c| c.chars().count())
                .unwrap_or(0)
    }
}

/// Output of one successful generation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub content: PromptContent,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    /// Wall-clock milliseconds spent in the generation call
    #[serde(rename = "generationTime")]
    pub generation_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_type_roundtrip_names() {
        for structure in StructureType::ALL {
            let parsed: StructureType = structure.as_str().parse().unwrap();
            assert_eq!(parsed, structure);
        }
        assert!("nested".parse::<StructureType>().is_err());
    }

    #[test]
    fn test_config_serializes_camel_case() {
        let config = GenerationConfig::new("Write a reviewer prompt", StructureType::Structured)
            .with_type("system")
            .with_file_context("fn main() {}");
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["userInput"], "Write a reviewer prompt");
        assert_eq!(value["structureType"], "structured");
        assert_eq!(value["type"], "system");
        assert_eq!(value["fileContext"], "fn main() {}");
    }

    #[test]
    fn test_prompt_length_counts_characters() {
        let config = GenerationConfig::new("héllo", StructureType::Standard);
        assert_eq!(config.prompt_length(), 5);

        let with_context = config.with_file_context("abc");
        assert_eq!(with_context.prompt_length(), 8);
    }
}
