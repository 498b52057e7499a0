//! Credits Command
//!
//! Usage:
//!   promptloom credits balance
//!   promptloom credits grant <amount> [--reason "..."]
//!   promptloom credits subscribe <plan> [--status active] [--no-ai]
//!   promptloom credits history [-n 20]
//!
//! `balance` works against either ledger backend. The other actions manage
//! the local ledger only.

use crate::billing::UsageEntry;
use crate::billing::local::parse_timestamp;
use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::types::Result;

pub async fn balance(ctx: &CommandContext, format: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let ledger = ctx.ledger()?;
    let info = ledger.subscription_info(user).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&format!("Credits for {}", user));
    out.field("Plan", &info.plan);
    out.field("Status", &info.status);
    out.field("AI access", if info.can_use_ai { "yes" } else { "no" });
    match info.credits_remaining {
        Some(credits) => out.field("Balance", format!("{} credits", credits)),
        None => out.field("Balance", "(not reported by ledger)"),
    }
    Ok(())
}

pub fn grant(ctx: &CommandContext, amount: u32, reason: Option<&str>) -> Result<()> {
    let user = ctx.require_user()?;
    let balance = ctx.local_ledger()?.grant_credits(user, amount, reason)?;
    Output::new().success(&format!(
        "Granted {} credits to {} (balance {})",
        amount, user, balance
    ));
    Ok(())
}

pub fn subscribe(ctx: &CommandContext, plan: &str, status: &str, can_use_ai: bool) -> Result<()> {
    let user = ctx.require_user()?;
    ctx.local_ledger()?
        .set_subscription(user, plan, status, can_use_ai)?;
    Output::new().success(&format!(
        "{} is on plan '{}' ({}), AI access {}",
        user,
        plan,
        status,
        if can_use_ai { "enabled" } else { "disabled" }
    ));
    Ok(())
}

pub fn history(ctx: &CommandContext, limit: usize, format: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let entries = ctx.local_ledger()?.usage_history(user, limit)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&format!("Usage for {}", user));
    if entries.is_empty() {
        out.info("No usage recorded");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &UsageEntry) -> String {
    let when = parse_timestamp(&entry.created_at)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| entry.created_at.clone());
    let outcome = if entry.success { "ok" } else { "failed" };
    let charge = if entry.debited {
        format!("-{}", entry.total_cost)
    } else {
        format!("({} not debited)", entry.total_cost)
    };

    let mut line = format!(
        "  {}  {:<6} {:>4} chars  {}/{}  {}",
        when, outcome, entry.prompt_length, entry.provider, entry.model, charge
    );
    if let Some(message) = &entry.error_message {
        line.push_str(&format!("  [{}]", message));
    }
    line
}
