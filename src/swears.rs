//! Per-(chat, user, word) swear counters (SQLite).

use crate::error::Result;
use anyhow::Context as _;
use chrono::Utc;
use sqlx::{Row as _, SqlitePool};

/// Upsert-style counters, unique per (chat, user, word). Counts only ever
/// grow; the leaderboard aggregation lives in the activity sampler.
#[derive(Debug, Clone)]
pub struct SwearCounts {
    pool: SqlitePool,
}

impl SwearCounts {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Increment the counter for one word occurrence, creating the row on
    /// first sight.
    pub async fn increment(
        &self,
        chat_id: i64,
        user_id: i64,
        word: &str,
        username: &str,
        display_name: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO swear_counts (chat_id, user_id, word, username, display_name, count, updated_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?) \
             ON CONFLICT(chat_id, user_id, word) DO UPDATE SET \
                count = count + 1, \
                username = excluded.username, \
                display_name = excluded.display_name, \
                updated_at = excluded.updated_at",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(word)
        .bind(username)
        .bind(display_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to upsert swear count")?;

        Ok(())
    }

    /// Current count for one (chat, user, word) key; 0 when absent.
    pub async fn count(&self, chat_id: i64, user_id: i64, word: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT count FROM swear_counts WHERE chat_id = ? AND user_id = ? AND word = ?",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(word)
        .fetch_optional(&self.pool)
        .await
        .context("failed to read swear count")?;

        Ok(row.and_then(|r| r.try_get("count").ok()).unwrap_or(0))
    }
}
