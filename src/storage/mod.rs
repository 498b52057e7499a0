pub mod database;
pub mod prompt_store;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use prompt_store::{PromptStore, StoredPrompt};
