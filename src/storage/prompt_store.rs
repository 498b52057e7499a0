use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use super::SharedDatabase;
use crate::types::{
    GenerationConfig, GenerationResult, LoomError, PromptContent, Result, ResultExt, UserId,
};

/// A successful generation kept for history and regeneration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrompt {
    pub id: String,
    pub user_id: String,
    pub config: GenerationConfig,
    pub result: GenerationResult,
    pub total_cost: u32,
    pub created_at: DateTime<Utc>,
}

/// (id, user, config, content, provider, model, tokens, time_ms, cost, created_at)
type PromptRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<i64>,
    i64,
    i64,
    String,
);

const SELECT_COLUMNS: &str = "SELECT id, user_id, config_json, content_json, provider, model,
        tokens_used, generation_time_ms, total_cost, created_at FROM prompt_history";

#[derive(Debug, Clone)]
pub struct PromptStore {
    db: SharedDatabase,
}

impl PromptStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub fn save(
        &self,
        user: &UserId,
        config: &GenerationConfig,
        result: &GenerationResult,
        total_cost: u32,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let config_json = serde_json::to_string(config)?;
        let content_json = serde_json::to_string(&result.content)?;

        self.db.execute(
            "INSERT INTO prompt_history
             (id, user_id, config_json, content_json, structure_type, provider, model,
              tokens_used, generation_time_ms, total_cost, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            &[
                &id,
                &user.as_str(),
                &config_json,
                &content_json,
                &result.content.structure_type().as_str(),
                &result.provider,
                &result.model,
                &result.tokens_used.map(i64::from),
                &(result.generation_time_ms as i64),
                &(total_cost as i64),
                &Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::debug!("Stored prompt {} for {}", id, user);
        Ok(id)
    }

    /// One of the user's prompts. Another user's id is reported as not found.
    pub fn get(&self, user: &UserId, id: &str) -> Result<StoredPrompt> {
        let conn = self.db.connection()?;
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1 AND user_id = ?2", SELECT_COLUMNS),
                params![id, user.as_str()],
                read_row,
            )
            .optional()
            .with_context_fn(|| format!("Failed to load prompt {}", id))?;

        match row {
            Some(row) => row_to_prompt(row),
            None => Err(LoomError::NotFound(format!("prompt {}", id))),
        }
    }

    /// Most recent prompts of a user, newest first
    pub fn list(&self, user: &UserId, limit: usize) -> Result<Vec<StoredPrompt>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![user.as_str(), limit as i64], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(row_to_prompt).collect()
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PromptRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn row_to_prompt(row: PromptRow) -> Result<StoredPrompt> {
    let (id, user_id, config_json, content_json, provider, model, tokens, time_ms, cost, created) =
        row;

    let config: GenerationConfig = serde_json::from_str(&config_json)?;
    let content: PromptContent = serde_json::from_str(&content_json)?;
    let created_at = DateTime::parse_from_rfc3339(&created)
        .with_context_fn(|| format!("Invalid timestamp on prompt {}", id))?
        .with_timezone(&Utc);

    Ok(StoredPrompt {
        id,
        user_id,
        config,
        result: GenerationResult {
            content,
            provider,
            model,
            tokens_used: tokens.map(|t| t as u32),
            generation_time_ms: time_ms as u64,
        },
        total_cost: cost as u32,
        created_at,
    })
}
