//! History Command
//!
//! Lists or shows prompts kept from successful generations.

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::storage::StoredPrompt;
use crate::types::Result;

pub fn list(ctx: &CommandContext, limit: usize, format: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let prompts = ctx.prompt_store()?.list(user, limit)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&prompts)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&format!("Prompt history for {}", user));
    if prompts.is_empty() {
        out.info("No prompts generated yet");
        return Ok(());
    }
    for prompt in &prompts {
        println!("{}", summary_line(prompt));
    }
    out.info("Show one with `promptloom history --show <id>`, re-run with `promptloom regenerate <id>`");
    Ok(())
}

pub fn show(ctx: &CommandContext, id: &str, format: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let prompt = ctx.prompt_store()?.get(user, id)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&prompt)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&format!("Prompt {}", prompt.id));
    out.field("Created", prompt.created_at.format("%Y-%m-%d %H:%M:%S"));
    out.field("Request", &prompt.config.user_input);
    out.field("Structure", prompt.config.structure_type);
    out.field("Complexity", prompt.config.complexity);
    out.field(
        "Model",
        format!("{}/{}", prompt.result.provider, prompt.result.model),
    );
    out.field("Cost", format!("{} credits", prompt.total_cost));
    out.section("Content");
    println!("{}", prompt.result.content.render_text());
    Ok(())
}

const PREVIEW_CHARS: usize = 48;

fn summary_line(prompt: &StoredPrompt) -> String {
    let input = &prompt.config.user_input;
    let preview: String = if input.chars().count() > PREVIEW_CHARS {
        let head: String = input.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", head)
    } else {
        input.clone()
    };

    format!(
        "  {}  {}  {:<10} {:>3} cr  {}",
        prompt.id,
        prompt.created_at.format("%Y-%m-%d %H:%M"),
        prompt.config.structure_type,
        prompt.total_cost,
        preview
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerationConfig, GenerationResult, PromptContent, Segment, StructureType};
    use chrono::Utc;

    fn stored(input: &str) -> StoredPrompt {
        StoredPrompt {
            id: "p-1".to_string(),
            user_id: "bob".to_string(),
            config: GenerationConfig::new(input, StructureType::Standard),
            result: GenerationResult {
                content: PromptContent::Standard {
                    segments: vec![Segment {
                        content: "hello".to_string(),
                    }],
                },
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                tokens_used: None,
                generation_time_ms: 5,
            },
            total_cost: 7,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_truncates_long_input() {
        let line = summary_line(&stored(&"x".repeat(100)));
        assert!(line.contains(&format!("{}…", "x".repeat(PREVIEW_CHARS))));
        assert!(!line.contains(&"x".repeat(PREVIEW_CHARS + 1)));
    }

    #[test]
    fn test_summary_keeps_short_input() {
        let line = summary_line(&stored("review code"));
        assert!(line.contains("review code"));
        assert!(line.contains("7 cr"));
    }
}
