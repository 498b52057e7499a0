//! Configuration Types
//!
//! All configuration structures with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::provider::ProvidersConfig;
use crate::ai::registry::{ProviderId, provider_info};
use crate::ai::timeout::TimeoutConfig;
use crate::billing::pricing::PricingTable;
use crate::constants::{generation as gen_constants, network};
use crate::types::{Complexity, LoomError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Acting user for CLI commands
    pub user: Option<String>,

    /// Process-wide AI settings
    pub ai: AiSettings,

    /// Completion provider credentials and endpoints
    pub providers: ProvidersConfig,

    /// Credit ledger backend
    pub ledger: LedgerConfig,

    /// Per-call timeouts
    pub timeouts: TimeoutConfig,

    /// Cost tables by feature type
    pub pricing: PricingTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            user: None,
            ai: AiSettings::default(),
            providers: ProvidersConfig::default(),
            ledger: LedgerConfig::default(),
            timeouts: TimeoutConfig::default(),
            pricing: PricingTable::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        self.ai.validate()?;
        self.timeouts.validate()?;
        self.pricing.validate()?;
        self.ledger.validate()?;

        // The configured feature must be priced, otherwise every attempt fails
        self.pricing.feature(&self.ai.feature_type).map_err(|_| {
            LoomError::Config(format!(
                "ai.feature_type '{}' has no [pricing.features.{}] table",
                self.ai.feature_type, self.ai.feature_type
            ))
        })?;

        for id in ProviderId::ALL {
            if let Some(base) = &self.providers.get(id).api_base {
                url::Url::parse(base).map_err(|e| {
                    LoomError::Config(format!("providers.{}.api_base is invalid: {}", id, e))
                })?;
            }
            if self.providers.get(id).timeout_secs == 0 {
                return Err(LoomError::Config(format!(
                    "providers.{}.timeout_secs must be greater than 0",
                    id
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// AI Settings
// =============================================================================

/// Read-only AI configuration injected into the orchestrator.
///
/// Sampling temperature is not configurable; every request uses
/// `constants::generation::TEMPERATURE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub provider: ProviderId,
    pub model: String,
    pub default_complexity: Complexity,
    pub max_tokens: u32,
    /// Pricing table used for generation attempts
    pub feature_type: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: ProviderId::OpenAi,
            model: provider_info(ProviderId::OpenAi).default_model.to_string(),
            default_complexity: Complexity::Medium,
            max_tokens: gen_constants::MAX_OUTPUT_TOKENS,
            feature_type: gen_constants::DEFAULT_FEATURE_TYPE.to_string(),
        }
    }
}

impl AiSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(LoomError::Config(
                "ai.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(LoomError::Config("ai.model must not be empty".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Ledger Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// SQLite database on this machine
    #[default]
    Local,
    /// RPC endpoint
    Remote,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Local database path (defaults to the platform data directory)
    pub database_path: Option<PathBuf>,
    pub remote_url: Option<String>,
    #[serde(skip_serializing)]
    pub remote_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("backend", &self.backend)
            .field("database_path", &self.database_path)
            .field("remote_url", &self.remote_url)
            .field(
                "remote_api_key",
                &self.remote_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Local,
            database_path: None,
            remote_url: None,
            remote_api_key: None,
            timeout_secs: network::LEDGER_TIMEOUT_SECS,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == LedgerBackend::Remote {
            let url = self.remote_url.as_deref().ok_or_else(|| {
                LoomError::Config("ledger.remote_url is required for the remote backend".into())
            })?;
            url::Url::parse(url)
                .map_err(|e| LoomError::Config(format!("ledger.remote_url is invalid: {}", e)))?;
        }
        if self.timeout_secs == 0 {
            return Err(LoomError::Config(
                "ledger.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path, falling back to `<data dir>/promptloom/ledger.db`
    pub fn resolve_database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("", "", "promptloom")
                .map(|dirs| dirs.data_dir().join("ledger.db"))
                .unwrap_or_else(|| PathBuf::from(".promptloom").join("ledger.db"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::generation::DEFAULT_FEATURE_TYPE;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ai.provider, ProviderId::OpenAi);
        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.ai.max_tokens, 2048);
        assert_eq!(config.ai.feature_type, DEFAULT_FEATURE_TYPE);
    }

    #[test]
    fn test_empty_model_rejected() {
        let mut config = Config::default();
        config.ai.model = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ai.model"));
    }

    #[test]
    fn test_temperature_key_is_not_a_setting() {
        let settings: AiSettings =
            toml::from_str("model = \"gpt-4o\"\ntemperature = 1.5\n").unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(
            serde_json::to_value(&settings).unwrap().get("temperature"),
            None
        );
    }

    #[test]
    fn test_unpriced_feature_rejected() {
        let mut config = Config::default();
        config.ai.feature_type = "image_generation".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("image_generation"));
    }

    #[test]
    fn test_remote_ledger_requires_url() {
        let mut config = Config::default();
        config.ledger.backend = LedgerBackend::Remote;
        assert!(config.validate().is_err());

        config.ledger.remote_url = Some("https://ledger.example.com/rest/v1".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ledger_key_redacted_and_not_serialized() {
        let ledger = LedgerConfig {
            remote_api_key: Some("service-role-key".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", ledger).contains("service-role-key"));
        assert!(!toml::to_string(&ledger).unwrap().contains("service-role-key"));
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let ledger = LedgerConfig {
            database_path: Some(PathBuf::from("/tmp/credits.db")),
            ..Default::default()
        };
        assert_eq!(ledger.resolve_database_path(), PathBuf::from("/tmp/credits.db"));
        assert!(
            LedgerConfig::default()
                .resolve_database_path()
                .ends_with("ledger.db")
        );
    }
}
