//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::ai::client::GenerationClient;
use crate::ai::provider::ProviderSet;
use crate::billing::{LocalLedger, RemoteLedger, SharedLedger};
use crate::config::{Config, ConfigLoader, LedgerBackend};
use crate::generation::GenerationOrchestrator;
use crate::storage::{Database, PromptStore, SharedDatabase};
use crate::types::{LoomError, Result, UserId};

/// Command execution context
///
/// Resolved configuration plus the acting user. Resources (database,
/// ledger, providers) are opened on demand so commands like `estimate`
/// never touch the network or disk beyond config.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    user: Option<UserId>,
}

impl CommandContext {
    /// Load configuration (from `config_path` alone when given) and resolve
    /// the acting user: `--user` flag first, then the `user` config key.
    pub fn load(config_path: Option<&Path>, user: Option<String>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };

        let user = user
            .or_else(|| config.user.clone())
            .map(UserId::parse)
            .transpose()?;

        Ok(Self { config, user })
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&UserId> {
        self.user.as_ref().ok_or_else(|| {
            LoomError::NotAuthorized(
                "no user given. Pass --user or set `user` in config (PROMPTLOOM_USER)".to_string(),
            )
        })
    }

    /// Open and initialize the local database
    pub fn open_database(&self) -> Result<SharedDatabase> {
        let path = self.config.ledger.resolve_database_path();
        tracing::debug!("Opening database at {}", path.display());
        let db = Database::open(&path)?;
        db.initialize()?;
        Ok(Arc::new(db))
    }

    /// The configured credit ledger
    pub fn ledger(&self) -> Result<SharedLedger> {
        let ledger = &self.config.ledger;
        match ledger.backend {
            LedgerBackend::Local => Ok(Arc::new(self.local_ledger()?)),
            LedgerBackend::Remote => {
                let url = ledger.remote_url.as_deref().ok_or_else(|| {
                    LoomError::Config("ledger.remote_url is not set".to_string())
                })?;
                Ok(Arc::new(RemoteLedger::new(
                    url,
                    ledger.remote_api_key.clone(),
                    ledger.timeout_secs,
                )?))
            }
        }
    }

    /// The local ledger, for administrative commands
    pub fn local_ledger(&self) -> Result<LocalLedger> {
        if self.config.ledger.backend != LedgerBackend::Local {
            return Err(LoomError::Config(
                "this command manages the local ledger; ledger.backend is 'remote'".to_string(),
            ));
        }
        Ok(LocalLedger::new(self.open_database()?))
    }

    pub fn prompt_store(&self) -> Result<PromptStore> {
        Ok(PromptStore::new(self.open_database()?))
    }

    /// Build the orchestrator from configuration
    pub fn orchestrator(&self) -> Result<GenerationOrchestrator> {
        let ai = &self.config.ai;
        let providers = ProviderSet::from_config(&self.config.providers)?;
        let client = GenerationClient::new(providers).with_max_tokens(ai.max_tokens);

        Ok(GenerationOrchestrator::new(
            ai.clone(),
            self.config.pricing.clone(),
            self.ledger()?,
            client,
            self.config.timeouts.clone(),
        )
        .with_store(self.prompt_store()?))
    }
}

/// Cancellation token tripped by Ctrl-C
pub fn install_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}
