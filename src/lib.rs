//! promptloom - Credit-Metered Structured Prompt Generation
//!
//! Generates component-based prompts through OpenAI or Anthropic and bills
//! every paid attempt against a credit ledger.
//!
//! ## Pipeline
//!
//! 1. Authorize the user against the ledger's subscription record
//! 2. Price the request (base cost × provider × model × complexity × length)
//! 3. Check the balance covers the price
//! 4. Generate and validate the structured content
//! 5. Record usage exactly once, success or failure
//!
//! ## Quick Start
//!
//! ```ignore
//! use promptloom::{Config, GenerationOrchestrator, LocalLedger, Database};
//!
//! let db = Arc::new(Database::open("ledger.db")?);
//! db.initialize()?;
//! let ledger = Arc::new(LocalLedger::new(db));
//! let client = GenerationClient::new(ProviderSet::from_config(&config.providers)?);
//! let orchestrator = GenerationOrchestrator::new(
//!     config.ai, config.pricing, ledger, client, config.timeouts,
//! );
//! let generated = orchestrator.generate(Some(&user), &request, &cancel).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider registry, completion backends, generation client
//! - [`billing`]: pricing, credit ledger gateway, billing intents
//! - [`generation`]: the attempt state machine
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`config`]: layered configuration

pub mod ai;
pub mod billing;
pub mod cli;
pub mod config;
pub mod constants;
pub mod generation;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{AiSettings, Config, ConfigLoader, LedgerBackend, LedgerConfig};

// Error Types
pub use types::error::{ErrorCategory, GenerationError, LoomError, Result, ResultExt};

// Domain
pub use types::{
    Complexity, GenerationConfig, GenerationResult, PromptContent, StructureType, UserId,
};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{Database, PromptStore, SharedDatabase};

// =============================================================================
// Billing Re-exports
// =============================================================================

pub use billing::{
    CostCalculation, CreditLedger, LocalLedger, PricingTable, RemoteLedger, SharedLedger,
    SubscriptionInfo, UsageRecord,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{GenerationClient, ProviderId, ProviderSet, TimeoutConfig, with_timeout};

pub use generation::{GeneratedPrompt, GenerationOrchestrator};
