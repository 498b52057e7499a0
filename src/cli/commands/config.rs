//! Config Command
//!
//! Usage:
//!   promptloom config show [-f json]
//!   promptloom config path
//!   promptloom config init [-g] [--force]

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration. Secrets are never rendered.
pub fn show(ctx: &CommandContext, format: &str) -> Result<()> {
    let rendered = ConfigLoader::render(&ctx.config, format == "json")?;
    println!("{}", rendered);
    Ok(())
}

/// Show configuration and ledger database paths
pub fn path(ctx: &CommandContext) -> Result<()> {
    let out = Output::new();
    out.header("Configuration paths");
    for (label, path) in ConfigLoader::describe_paths(&ctx.config) {
        out.field(label, path);
    }
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };

    let scope = if global { "global" } else { "project" };
    Output::new().success(&format!("Initialized {} configuration", scope));
    println!("  Config: {}", path.display());
    Ok(())
}
