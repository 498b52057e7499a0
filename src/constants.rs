//! Global Constants
//!
//! Centralized constants for pricing, generation and networking.
//! All magic numbers should be defined here with documentation.

/// Generation request constants
pub mod generation {
    /// Sampling temperature sent to every completion backend
    pub const TEMPERATURE: f32 = 0.7;

    /// Output token budget per completion
    pub const MAX_OUTPUT_TOKENS: u32 = 2048;

    /// Error code attached to every generation failure
    pub const GENERATION_FAILED: &str = "GENERATION_FAILED";

    /// Feature type billed for prompt generation
    pub const DEFAULT_FEATURE_TYPE: &str = "prompt_generation";
}

/// Credit pricing constants
pub mod pricing {
    /// Base credit cost of one prompt generation
    pub const DEFAULT_BASE_COST: u32 = 10;

    /// Prompts up to this many characters use the short-tier multiplier
    pub const SHORT_PROMPT_MAX: usize = 500;

    /// Prompts up to this many characters use the medium-tier multiplier
    pub const MEDIUM_PROMPT_MAX: usize = 1500;

    /// Products closer than this to an integer are treated as that integer before ceiling
    pub const CEILING_EPSILON: f64 = 1e-9;

    /// Multiplier applied when a table has no entry for a key
    pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

    /// Length tier multipliers
    pub mod length {
        pub const SHORT: f64 = 1.0;
        pub const MEDIUM: f64 = 1.2;
        pub const LONG: f64 = 1.5;
    }
}

/// Ledger constants
pub mod ledger {
    /// Credits granted to an account created implicitly on first use
    pub const INITIAL_BALANCE: i64 = 0;

    /// Default number of usage entries shown by history listings
    pub const DEFAULT_HISTORY_LIMIT: usize = 20;
}

/// HTTP/Network constants
pub mod network {
    /// Default completion request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;

    /// Default timeout for ledger and authorization RPCs (seconds)
    pub const LEDGER_TIMEOUT_SECS: u64 = 15;
}
