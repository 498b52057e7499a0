//! Cost Calculator
//!
//! Credit cost of one generation attempt:
//!
//! ```text
//! total = ceil(base_cost * provider * model * complexity * length)
//! ```
//!
//! Missing provider, model or complexity entries price at 1.0. Only an
//! unknown feature type is an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::generation::DEFAULT_FEATURE_TYPE;
use crate::constants::pricing as pricing_constants;
use crate::types::{Complexity, LoomError, Result};

// =============================================================================
// Length Tiers
// =============================================================================

/// Prompt length bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthTier {
    Short,
    Medium,
    Long,
}

impl LengthTier {
    /// Bucket a prompt length; both upper bounds are inclusive
    pub fn from_length(prompt_length: usize) -> Self {
        if prompt_length <= pricing_constants::SHORT_PROMPT_MAX {
            LengthTier::Short
        } else if prompt_length <= pricing_constants::MEDIUM_PROMPT_MAX {
            LengthTier::Medium
        } else {
            LengthTier::Long
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthTier::Short => "short",
            LengthTier::Medium => "medium",
            LengthTier::Long => "long",
        }
    }
}

impl std::fmt::Display for LengthTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiplier per length tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthMultipliers {
    pub short: f64,
    pub medium: f64,
    pub long: f64,
}

impl Default for LengthMultipliers {
    fn default() -> Self {
        Self {
            short: pricing_constants::length::SHORT,
            medium: pricing_constants::length::MEDIUM,
            long: pricing_constants::length::LONG,
        }
    }
}

impl LengthMultipliers {
    pub fn for_tier(&self, tier: LengthTier) -> f64 {
        match tier {
            LengthTier::Short => self.short,
            LengthTier::Medium => self.medium,
            LengthTier::Long => self.long,
        }
    }
}

// =============================================================================
// Pricing Tables
// =============================================================================

/// Pricing table for one feature type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturePricing {
    pub base_cost: u32,
    pub providers: BTreeMap<String, f64>,
    pub models: BTreeMap<String, f64>,
    pub complexity: BTreeMap<String, f64>,
    pub length: LengthMultipliers,
}

impl Default for FeaturePricing {
    fn default() -> Self {
        Self {
            base_cost: pricing_constants::DEFAULT_BASE_COST,
            providers: BTreeMap::new(),
            models: BTreeMap::new(),
            complexity: BTreeMap::new(),
            length: LengthMultipliers::default(),
        }
    }
}

impl FeaturePricing {
    /// Built-in table for prompt generation
    pub fn prompt_generation() -> Self {
        let table = |entries: &[(&str, f64)]| {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            base_cost: pricing_constants::DEFAULT_BASE_COST,
            providers: table(&[("openai", 1.0), ("anthropic", 1.2)]),
            models: table(&[
                ("gpt-4o-mini", 1.0),
                ("gpt-4o", 2.0),
                ("claude-3-5-haiku-latest", 1.0),
                ("claude-sonnet-4-20250514", 2.5),
            ]),
            complexity: table(&[("simple", 1.0), ("medium", 1.5), ("complex", 2.0)]),
            length: LengthMultipliers::default(),
        }
    }

    fn lookup(table: &BTreeMap<String, f64>, key: &str) -> f64 {
        table
            .get(key)
            .copied()
            .unwrap_or(pricing_constants::NEUTRAL_MULTIPLIER)
    }

    fn validate(&self, feature: &str) -> Result<()> {
        if self.base_cost == 0 {
            return Err(LoomError::Config(format!(
                "pricing.features.{}.base_cost must be greater than 0",
                feature
            )));
        }

        let named = [
            ("providers", &self.providers),
            ("models", &self.models),
            ("complexity", &self.complexity),
        ];
        let entries = named
            .iter()
            .flat_map(|(table, values)| {
                values
                    .iter()
                    .map(move |(key, value)| (format!("{}.{}", table, key), *value))
            })
            .chain([
                ("length.short".to_string(), self.length.short),
                ("length.medium".to_string(), self.length.medium),
                ("length.long".to_string(), self.length.long),
            ]);

        for (path, value) in entries {
            if !value.is_finite() || value <= 0.0 {
                return Err(LoomError::Config(format!(
                    "pricing.features.{}.{} must be a positive number, got {}",
                    feature, path, value
                )));
            }
        }
        Ok(())
    }
}

/// Pricing tables keyed by feature type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    pub features: BTreeMap<String, FeaturePricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut features = BTreeMap::new();
        features.insert(
            DEFAULT_FEATURE_TYPE.to_string(),
            FeaturePricing::prompt_generation(),
        );
        Self { features }
    }
}

impl PricingTable {
    pub fn feature(&self, feature_type: &str) -> Result<&FeaturePricing> {
        self.features
            .get(feature_type)
            .ok_or_else(|| LoomError::UnknownFeature(feature_type.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, pricing) in &self.features {
            pricing.validate(name)?;
        }
        Ok(())
    }

    /// Compute the credit cost of one attempt. Pure and deterministic.
    pub fn calculate_cost(
        &self,
        feature_type: &str,
        provider: &str,
        model: &str,
        complexity: Complexity,
        prompt_length: usize,
    ) -> Result<CostCalculation> {
        let pricing = self.feature(feature_type)?;

        let breakdown = CostBreakdown {
            provider: FeaturePricing::lookup(&pricing.providers, provider),
            model: FeaturePricing::lookup(&pricing.models, model),
            complexity: FeaturePricing::lookup(&pricing.complexity, complexity.as_str()),
            length: pricing
                .length
                .for_tier(LengthTier::from_length(prompt_length)),
        };
        let multiplier = breakdown.product();

        Ok(CostCalculation {
            base_cost: pricing.base_cost,
            multiplier,
            total_cost: ceil_credits(pricing.base_cost as f64 * multiplier),
            breakdown,
        })
    }
}

/// Round up to whole credits, ignoring floating-point noise around integers
fn ceil_credits(raw: f64) -> u32 {
    let nearest = raw.round();
    let snapped = if (raw - nearest).abs() < pricing_constants::CEILING_EPSILON {
        nearest
    } else {
        raw.ceil()
    };
    snapped as u32
}

// =============================================================================
// Cost Calculation
// =============================================================================

/// Per-factor multipliers behind a cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub provider: f64,
    pub model: f64,
    pub complexity: f64,
    pub length: f64,
}

impl CostBreakdown {
    pub fn product(&self) -> f64 {
        self.provider * self.model * self.complexity * self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCalculation {
    pub base_cost: u32,
    pub multiplier: f64,
    pub total_cost: u32,
    pub breakdown: CostBreakdown,
}
