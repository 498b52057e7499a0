pub mod content;
pub mod error;
pub mod generation;

pub use content::{Block, Module, PromptContent, STRUCTURE_TAG, Section, Segment};
pub use error::{
    ErrorCategory, ErrorClassifier, GenerationError, LoomError, Result, ResultExt,
    ValidationError, ValidationErrorKind,
};
pub use generation::{Complexity, GenerationConfig, GenerationResult, StructureType};

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe wrapper for user IDs
///
/// Prevents accidental mixing of user IDs with other string types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user ID, rejecting blank values
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(LoomError::NotAuthorized("user id is empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
