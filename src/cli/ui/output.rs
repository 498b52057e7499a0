use console::style;

use crate::billing::CostCalculation;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Aligned `key: value` line
    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", style(format!("{}:", key)).dim(), value);
    }

    pub fn cost(&self, cost: &CostCalculation) {
        self.field("Base cost", cost.base_cost);
        self.field(
            "Multipliers",
            format!(
                "provider {} × model {} × complexity {} × length {}",
                cost.breakdown.provider,
                cost.breakdown.model,
                cost.breakdown.complexity,
                cost.breakdown.length
            ),
        );
        self.field("Multiplier", format!("{:.4}", cost.multiplier));
        self.field(
            "Total",
            style(format!("{} credits", cost.total_cost)).bold(),
        );
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
