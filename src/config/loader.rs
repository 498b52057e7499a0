//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/promptloom/config.toml)
//! 3. Project config (.promptloom/config.toml)
//! 4. Environment variables (PROMPTLOOM_* prefix, `__` between levels)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{LoomError, Result};

const ENV_PREFIX: &str = "PROMPTLOOM_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // PROMPTLOOM_AI__MODEL -> ai.model
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        Self::extract(figment)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| LoomError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/promptloom/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("promptloom"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".promptloom")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Describe config file locations, marking which exist
    pub fn describe_paths(config: &Config) -> Vec<(&'static str, String)> {
        let mark = |path: &Path| {
            let exists = if path.exists() { "✓" } else { "✗" };
            format!("{} {}", exists, path.display())
        };

        vec![
            (
                "Global",
                Self::global_config_path()
                    .map(|p| mark(&p))
                    .unwrap_or_else(|| "(not available)".to_string()),
            ),
            ("Project", mark(&Self::project_config_path())),
            ("Ledger", mark(&config.ledger.resolve_database_path())),
        ]
    }

    /// Render the effective configuration as TOML or JSON
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| LoomError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write the global config file. Existing files are kept unless `force`.
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            LoomError::Config("Cannot determine global config directory".to_string())
        })?;
        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        Self::write_template(&config_path, &Self::default_global_config(), force)?;
        Ok(config_path)
    }

    /// Write the project config file. Existing files are kept unless `force`.
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        Self::write_template(&config_path, Self::default_project_config(), force)?;
        Ok(config_path)
    }

    fn write_template(path: &Path, content: &str, force: bool) -> Result<()> {
        if path.exists() && !force {
            info!("Config exists: {}", path.display());
            return Ok(());
        }
        fs::write(path, content)?;
        info!("Created config: {}", path.display());
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        let defaults = Config::default();
        format!(
            r#"# promptloom global configuration
# User-wide defaults. Project settings in .promptloom/config.toml override these.

version = "1.0"
# user = "you@example.com"

[ai]
provider = "{}"
model = "{}"
default_complexity = "{}"
max_tokens = {}

# Credentials fall back to OPENAI_API_KEY / ANTHROPIC_API_KEY
[providers.openai]
# api_key = "sk-..."
timeout_secs = {}

[providers.anthropic]
# api_key = "sk-ant-..."
timeout_secs = {}

[ledger]
backend = "local"
# database_path = "/path/to/ledger.db"
# backend = "remote"
# remote_url = "https://<project>.example.com/rest/v1"
"#,
            defaults.ai.provider,
            defaults.ai.model,
            defaults.ai.default_complexity,
            defaults.ai.max_tokens,
            defaults.providers.openai.timeout_secs,
            defaults.providers.anthropic.timeout_secs,
        )
    }

    fn default_project_config() -> &'static str {
        r#"# promptloom project configuration
# Project-specific settings that override global defaults.

version = "1.0"

# [ai]
# provider = "anthropic"
# model = "claude-3-5-haiku-latest"

# [pricing.features.prompt_generation.models]
# "gpt-4o" = 2.0
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::registry::ProviderId;
    use crate::config::LedgerBackend;
    use crate::types::Complexity;
    use figment::Jail;

    /// Run a config test with an isolated cwd and HOME
    fn jailed(f: impl FnOnce(&mut Jail) -> figment::error::Result<()>) {
        Jail::expect_with(|jail| {
            let home = jail.directory().join("home");
            fs::create_dir_all(&home).map_err(|e| e.to_string())?;
            jail.set_env("HOME", home.display());
            jail.set_env("XDG_CONFIG_HOME", home.join(".config").display());
            f(jail)
        });
    }

    #[test]
    fn test_load_default_config() {
        jailed(|_| {
            let config = ConfigLoader::load().map_err(|e| e.to_string())?;
            assert_eq!(config.version, "1.0");
            assert_eq!(config.ai.provider, ProviderId::OpenAi);
            Ok(())
        });
    }

    #[test]
    fn test_project_overrides_global() {
        jailed(|jail| {
            let global = jail.directory().join("home/.config/promptloom");
            fs::create_dir_all(&global).map_err(|e| e.to_string())?;
            fs::write(
                global.join("config.toml"),
                "[ai]\nprovider = \"anthropic\"\nmodel = \"claude-3-5-haiku-latest\"\n",
            )
            .map_err(|e| e.to_string())?;

            jail.create_dir(".promptloom")?;
            jail.create_file(
                ".promptloom/config.toml",
                "[ai]\nmodel = \"claude-sonnet-4-20250514\"\ndefault_complexity = \"complex\"\n",
            )?;

            let config = ConfigLoader::load().map_err(|e| e.to_string())?;
            assert_eq!(config.ai.provider, ProviderId::Anthropic);
            assert_eq!(config.ai.model, "claude-sonnet-4-20250514");
            assert_eq!(config.ai.default_complexity, Complexity::Complex);
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        jailed(|jail| {
            jail.set_env("PROMPTLOOM_AI__MODEL", "gpt-4o");
            jail.set_env("PROMPTLOOM_LEDGER__BACKEND", "remote");
            jail.set_env("PROMPTLOOM_LEDGER__REMOTE_URL", "http://localhost:54321/rest/v1");
            jail.set_env("PROMPTLOOM_USER", "alice");

            let config = ConfigLoader::load().map_err(|e| e.to_string())?;
            assert_eq!(config.ai.model, "gpt-4o");
            assert_eq!(config.ledger.backend, LedgerBackend::Remote);
            assert_eq!(config.user.as_deref(), Some("alice"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_pricing_fails_load() {
        jailed(|jail| {
            jail.create_file(
                "pricing.toml",
                "[pricing.features.prompt_generation.models]\n\"gpt-4o\" = -1.0\n",
            )?;
            let err = ConfigLoader::load_from_file(Path::new("pricing.toml")).unwrap_err();
            assert!(err.to_string().contains("models.gpt-4o"));
            Ok(())
        });
    }

    #[test]
    fn test_pricing_overrides_merge_with_defaults() {
        jailed(|jail| {
            jail.create_file(
                "pricing.toml",
                "[pricing.features.prompt_generation.models]\n\"gpt-4.1\" = 1.8\n",
            )?;
            let config =
                ConfigLoader::load_from_file(Path::new("pricing.toml")).map_err(|e| e.to_string())?;
            let feature = config.pricing.feature("prompt_generation").map_err(|e| e.to_string())?;
            assert_eq!(feature.models.get("gpt-4.1"), Some(&1.8));
            assert_eq!(feature.models.get("gpt-4o"), Some(&2.0));
            Ok(())
        });
    }

    #[test]
    fn test_init_writes_loadable_templates() {
        jailed(|_| {
            let global = ConfigLoader::init_global(false).map_err(|e| e.to_string())?;
            let project = ConfigLoader::init_project(false).map_err(|e| e.to_string())?;
            assert!(global.exists());
            assert!(project.exists());

            ConfigLoader::load_from_file(&global).map_err(|e| e.to_string())?;
            let config = ConfigLoader::load().map_err(|e| e.to_string())?;
            let rendered = ConfigLoader::render(&config, false).map_err(|e| e.to_string())?;
            assert!(rendered.contains("[ai]"));
            Ok(())
        });
    }
}
