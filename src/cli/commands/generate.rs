//! Generate Command
//!
//! Usage:
//!   promptloom generate "<description>" [-s structured] [--complexity complex] [--file ctx.rs]
//!   promptloom regenerate <history-id>

use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::cli::ui::Output;
use crate::cli::{CommandContext, install_ctrl_c};
use crate::generation::GeneratedPrompt;
use crate::types::{
    Complexity, GenerationConfig, Result, StructureType, ValidationError, ValidationErrorKind,
};

/// Request fields shared by `generate` and `estimate`
#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    /// What the generated prompt should do
    pub input: String,

    #[arg(short, long, default_value = "standard", help = "standard, structured, modulized, advanced")]
    pub structure: StructureType,

    #[arg(long, help = "simple, medium, complex (default from config)")]
    pub complexity: Option<Complexity>,

    #[arg(long, default_value = "general")]
    pub category: String,

    #[arg(long = "type", default_value = "task", help = "Prompt type, e.g. system or task")]
    pub prompt_type: String,

    #[arg(long, default_value = "english")]
    pub language: String,

    #[arg(long, help = "File whose contents are given to the model as context")]
    pub file: Option<PathBuf>,
}

impl RequestArgs {
    pub fn to_config(&self, default_complexity: Complexity) -> Result<GenerationConfig> {
        let mut config = GenerationConfig::new(self.input.clone(), self.structure)
            .with_complexity(self.complexity.unwrap_or(default_complexity))
            .with_category(self.category.clone())
            .with_type(self.prompt_type.clone())
            .with_language(self.language.clone());

        if let Some(path) = &self.file {
            let context = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::new(ValidationErrorKind::Format, e.to_string())
                    .with_field(path.display().to_string())
            })?;
            config = config.with_file_context(context);
        }

        if config.user_input.trim().is_empty() {
            return Err(
                ValidationError::new(ValidationErrorKind::Empty, "input must not be empty")
                    .with_field("input")
                    .into(),
            );
        }
        Ok(config)
    }
}

pub async fn run(ctx: CommandContext, request: &RequestArgs, format: &str) -> Result<()> {
    let config = request.to_config(ctx.config.ai.default_complexity)?;
    execute(&ctx, &config, format).await
}

/// Re-run one of the acting user's stored generations with its original request
pub async fn regenerate(ctx: CommandContext, id: &str, format: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let stored = ctx.prompt_store()?.get(user, id)?;
    info!("Regenerating {} ({})", id, stored.config.structure_type);
    execute(&ctx, &stored.config, format).await
}

async fn execute(ctx: &CommandContext, config: &GenerationConfig, format: &str) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let cancel = install_ctrl_c();

    let generated = orchestrator.generate(ctx.user(), config, &cancel).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&generated)?);
    } else {
        print_text(&generated);
    }
    Ok(())
}

fn print_text(generated: &GeneratedPrompt) {
    let out = Output::new();
    let result = &generated.result;

    out.header(&format!("{} prompt", result.content.structure_type()));
    println!("{}", result.content.render_text());

    out.section("Generation");
    out.field("Provider", &result.provider);
    out.field("Model", &result.model);
    if let Some(tokens) = result.tokens_used {
        out.field("Tokens", tokens);
    }
    out.field("Time", format!("{} ms", result.generation_time_ms));
    if let Some(id) = &generated.history_id {
        out.field("History id", id);
    }

    out.section("Cost");
    out.cost(&generated.cost);
    if generated.debited {
        out.success(&format!("Charged {} credits", generated.cost.total_cost));
    } else {
        out.warning("Usage recorded without a balance debit");
    }
}
