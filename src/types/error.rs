//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Taxonomy
//!
//! - **NotAuthorized**: no user or no AI entitlement (fatal, never charged)
//! - **InsufficientCredits**: balance below the computed cost (fatal, never charged)
//! - **UnknownFeature**: feature type without a pricing table (programming error)
//! - **Generation**: backend, network or parse failure (charged, then propagated)
//!
//! Generation failures carry an [`ErrorCategory`] so logs and the CLI can say
//! *why* a provider call failed. Nothing in the generation flow retries.

use std::time::Duration;
use thiserror::Error;

use crate::constants::generation::GENERATION_FAILED;

// =============================================================================
// Error Categories
// =============================================================================

/// Classification of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited by the provider
    RateLimit,
    /// Context/token limit exceeded
    TokenLimit,
    /// Authentication failed
    Auth,
    /// Network/connectivity issues
    Network,
    /// Provider unavailable or not configured
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Response could not be parsed or failed validation
    ParseError,
    /// Temporary server issues
    Transient,
    /// Call was cancelled or timed out locally
    Cancelled,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// =============================================================================
// Generation Error
// =============================================================================

/// Terminal failure of one generation attempt
///
/// The `code` is always `GENERATION_FAILED`; the category refines it for
/// diagnostics without changing billing behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationError {
    /// Human-readable failure description (recorded in the ledger entry)
    pub message: String,
    /// Stable error code
    pub code: String,
    /// Provider that produced the error
    pub provider: String,
    /// Failure classification
    pub category: ErrorCategory,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}:{}:{}] {}",
            self.provider, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    /// Create a generation failure for a provider
    pub fn new(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: GENERATION_FAILED.to_string(),
            provider: provider.into(),
            category,
        }
    }

    /// Wrap an arbitrary failure, classifying it from its message
    pub fn wrap(err: &LoomError, provider: impl Into<String>) -> Self {
        let provider = provider.into();
        match err {
            LoomError::Generation(inner) => inner.clone(),
            LoomError::Timeout { .. } | LoomError::Cancelled { .. } => {
                Self::new(ErrorCategory::Cancelled, err.to_string(), provider)
            }
            LoomError::Json(_) | LoomError::Validation(_) => {
                Self::new(ErrorCategory::ParseError, err.to_string(), provider)
            }
            _ => ErrorClassifier::classify(&err.to_string(), &provider),
        }
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Message fragments that identify a category, checked in order
const MESSAGE_PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::RateLimit,
        &["rate limit", "429", "too many requests", "quota"],
    ),
    (
        ErrorCategory::TokenLimit,
        &["context length", "maximum context", "too many tokens", "max_tokens"],
    ),
    (
        ErrorCategory::Auth,
        &["401", "403", "api key", "unauthorized", "permission"],
    ),
    (
        ErrorCategory::Network,
        &["connection", "dns", "timed out", "unreachable"],
    ),
    (
        ErrorCategory::Unavailable,
        &["502", "503", "overloaded", "not configured"],
    ),
    (ErrorCategory::ParseError, &["parse", "json", "schema"]),
];

/// Maps provider failures onto categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a free-form failure message
    pub fn classify(message: &str, provider: &str) -> GenerationError {
        let lower = message.to_lowercase();
        let category = MESSAGE_PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::Unknown);
        GenerationError::new(category, message, provider)
    }

    /// Classify from the HTTP status of a failed response
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> GenerationError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 | 422 => ErrorCategory::BadRequest,
            404 => ErrorCategory::Unavailable,
            500 | 502 | 503 | 504 | 529 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        GenerationError::new(category, message, provider)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Structured validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// What validation failed
    pub kind: ValidationErrorKind,
    /// Field or component that failed validation
    pub field: Option<String>,
    /// Detailed message
    pub message: String,
    /// Expected value or format
    pub expected: Option<String>,
    /// Actual value received
    pub actual: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "Validation failed for '{}': {}", field, self.message)?;
        } else {
            write!(f, "Validation failed: {}", self.message)?;
        }
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {}, got {})", expected, actual)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add expected/actual values
    pub fn with_comparison(
        mut self,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

/// Validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Structure tag did not match the requested structure type
    TagMismatch,
    /// Required field missing
    MissingField,
    /// Sequence or text was empty
    Empty,
    /// Invalid format
    Format,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LoomError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Generation Gate Errors
    // -------------------------------------------------------------------------
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Insufficient credits: {required} credits required")]
    InsufficientCredits { required: u32 },

    #[error("Unknown feature type: {0}")]
    UnknownFeature(String),

    // -------------------------------------------------------------------------
    // Generation Errors
    // -------------------------------------------------------------------------
    #[error("Generation failed: {0}")]
    Generation(GenerationError),

    // -------------------------------------------------------------------------
    // Remote Call Errors
    // -------------------------------------------------------------------------
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Validation(ValidationError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<GenerationError> for LoomError {
    fn from(err: GenerationError) -> Self {
        LoomError::Generation(err)
    }
}

impl From<ValidationError> for LoomError {
    fn from(err: ValidationError) -> Self {
        LoomError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, LoomError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl LoomError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Whether the error was raised by a gate that runs before any charge
    pub fn is_gate_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorized(_) | Self::InsufficientCredits { .. } | Self::UnknownFeature(_)
        )
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| LoomError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| LoomError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
