//! Providers Command
//!
//! Lists the supported providers, their models, and which have a credential.

use serde::Serialize;

use crate::ai::provider::ProviderSet;
use crate::ai::registry::{ProviderId, all_providers};
use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::types::Result;

#[derive(Debug, Serialize)]
struct ProviderRow {
    id: ProviderId,
    name: &'static str,
    available: bool,
    credential_env: &'static str,
    default_model: &'static str,
    models: Vec<&'static str>,
}

fn rows(providers: &ProviderSet) -> Vec<ProviderRow> {
    all_providers()
        .iter()
        .map(|info| ProviderRow {
            id: info.id,
            name: info.display_name,
            available: providers.is_available(info.id),
            credential_env: info.credential_env,
            default_model: info.default_model,
            models: info.models.iter().map(|m| m.id).collect(),
        })
        .collect()
}

pub fn run(ctx: &CommandContext, format: &str) -> Result<()> {
    let providers = ProviderSet::from_config(&ctx.config.providers)?;
    let rows = rows(&providers);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let out = Output::new();
    out.header("Providers");
    for row in &rows {
        let selected = if row.id == ctx.config.ai.provider {
            " (selected)"
        } else {
            ""
        };
        if row.available {
            out.success(&format!("{}{}", row.name, selected));
        } else {
            out.warning(&format!("{}{}: set {}", row.name, selected, row.credential_env));
        }
        out.field("Default", row.default_model);
        out.field("Models", row.models.join(", "));
    }
    Ok(())
}
