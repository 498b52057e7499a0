use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptloom::cli::CommandContext;
use promptloom::constants::ledger::DEFAULT_HISTORY_LIMIT;
use promptloom::cli::commands::{self, generate::RequestArgs};

#[derive(Parser)]
#[command(name = "promptloom")]
#[command(
    version,
    about = "Credit-metered AI generation of structured prompts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Use this config file instead of the global/project chain")]
    config: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Acting user id (or `user` in config, PROMPTLOOM_USER)")]
    user: Option<String>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a prompt (charges credits)
    Generate {
        #[command(flatten)]
        request: RequestArgs,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Re-run a prompt from history with its original request (charges credits)
    Regenerate {
        #[arg(help = "History id")]
        id: String,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Show what a request would cost
    Estimate {
        #[command(flatten)]
        request: RequestArgs,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// List providers, models and credential status
    Providers {
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Manage credits and subscriptions
    Credits {
        #[command(subcommand)]
        action: CreditsAction,
    },

    /// List or show generated prompts
    History {
        #[arg(long, help = "Show one entry in full")]
        show: Option<String>,
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CreditsAction {
    /// Show plan and remaining credits
    Balance {
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },
    /// Add credits to the local ledger
    Grant {
        amount: u32,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Set the plan and AI entitlement in the local ledger
    Subscribe {
        plan: String,
        #[arg(long, default_value = "active")]
        status: String,
        #[arg(long, help = "Plan without AI generation")]
        no_ai: bool,
    },
    /// Show recorded usage from the local ledger
    History {
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'f', long, default_value = "toml", help = "Output format: toml, json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n{}", style("━━━ PANIC ━━━").red().bold());
        eprintln!("{}", style("promptloom encountered an unexpected error:").red());
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "{}",
                style(format!(
                    "Location: {}:{}:{}",
                    location.file(),
                    location.line(),
                    location.column()
                ))
                .dim()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // `config init` must work even when existing config fails to load
    if let Commands::Config {
        action: ConfigAction::Init { global, force },
    } = &cli.command
    {
        commands::config::init(*global, *force)?;
        return Ok(());
    }

    let ctx = CommandContext::load(cli.config.as_deref(), cli.user)?;

    match cli.command {
        Commands::Generate { request, format } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::generate::run(ctx, &request, &format))?;
        }
        Commands::Regenerate { id, format } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::generate::regenerate(ctx, &id, &format))?;
        }
        Commands::Estimate { request, format } => {
            commands::estimate::run(ctx, &request, &format)?;
        }
        Commands::Providers { format } => {
            commands::providers::run(&ctx, &format)?;
        }
        Commands::Credits { action } => match action {
            CreditsAction::Balance { format } => {
                let rt = Runtime::new()?;
                rt.block_on(commands::credits::balance(&ctx, &format))?;
            }
            CreditsAction::Grant { amount, reason } => {
                commands::credits::grant(&ctx, amount, reason.as_deref())?;
            }
            CreditsAction::Subscribe {
                plan,
                status,
                no_ai,
            } => {
                commands::credits::subscribe(&ctx, &plan, &status, !no_ai)?;
            }
            CreditsAction::History { limit, format } => {
                commands::credits::history(&ctx, limit, &format)?;
            }
        },
        Commands::History {
            show,
            limit,
            format,
        } => match show {
            Some(id) => commands::history::show(&ctx, &id, &format)?,
            None => commands::history::list(&ctx, limit, &format)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => commands::config::show(&ctx, &format)?,
            ConfigAction::Path => commands::config::path(&ctx)?,
            ConfigAction::Init { .. } => {}
        },
    }

    Ok(())
}
