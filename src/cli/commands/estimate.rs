//! Estimate Command
//!
//! Prices a request with the configured pricing table and the provider and
//! model from `[ai]`. Touches neither the ledger nor any provider.

use crate::billing::{CostCalculation, LengthTier};
use crate::cli::CommandContext;
use crate::cli::commands::generate::RequestArgs;
use crate::cli::ui::Output;
use crate::config::Config;
use crate::types::{GenerationConfig, Result};

pub fn run(ctx: CommandContext, request: &RequestArgs, format: &str) -> Result<()> {
    let config = request.to_config(ctx.config.ai.default_complexity)?;
    let cost = price(&ctx.config, &config)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&cost)?);
        return Ok(());
    }

    let out = Output::new();
    let ai = &ctx.config.ai;
    out.header("Cost estimate");
    out.field("Feature", &ai.feature_type);
    out.field("Provider", ai.provider);
    out.field("Model", &ai.model);
    out.field("Complexity", config.complexity);
    out.field(
        "Length",
        format!(
            "{} chars ({})",
            config.prompt_length(),
            LengthTier::from_length(config.prompt_length()).as_str()
        ),
    );
    out.section("Cost");
    out.cost(&cost);
    Ok(())
}

fn price(config: &Config, request: &GenerationConfig) -> Result<CostCalculation> {
    config.pricing.calculate_cost(
        &config.ai.feature_type,
        config.ai.provider.as_str(),
        &config.ai.model,
        request.complexity,
        request.prompt_length(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::registry::{ProviderId, provider_info};
    use crate::types::{Complexity, LoomError, StructureType};

    #[test]
    fn test_price_uses_configured_feature() {
        let config = Config::default();
        let request = GenerationConfig::new("short request", StructureType::Standard)
            .with_complexity(Complexity::Medium);
        let cost = price(&config, &request).unwrap();
        assert!(cost.total_cost >= 1);
        let pricing = config.pricing.feature(&config.ai.feature_type).unwrap();
        assert_eq!(cost.breakdown.length, pricing.length.short);
    }

    #[test]
    fn test_price_follows_ai_settings() {
        let mut config = Config::default();
        let request = GenerationConfig::new("short request", StructureType::Standard);
        let openai = price(&config, &request).unwrap();

        config.ai.provider = ProviderId::Anthropic;
        config.ai.model = provider_info(ProviderId::Anthropic).default_model.to_string();
        let anthropic = price(&config, &request).unwrap();

        let pricing = config.pricing.feature(&config.ai.feature_type).unwrap();
        assert_eq!(openai.breakdown.provider, pricing.providers["openai"]);
        assert_eq!(anthropic.breakdown.provider, pricing.providers["anthropic"]);
        assert_eq!(
            anthropic.breakdown.model,
            pricing.models["claude-3-5-haiku-latest"]
        );
    }

    #[test]
    fn test_price_unknown_feature() {
        let mut config = Config::default();
        config.ai.feature_type = "video".to_string();
        let request = GenerationConfig::new("x", StructureType::Standard);
        assert!(matches!(
            price(&config, &request).unwrap_err(),
            LoomError::UnknownFeature(_)
        ));
    }
}
