//! Chat message log persistence (SQLite).

use crate::error::Result;
use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row as _, SqlitePool};

/// Persists every text message seen in allowed chats.
///
/// Rows are immutable once stored; retention is operator-managed. Writes are
/// awaited by callers that need them and spawned fire-and-forget by the
/// message handler, which only logs failures.
#[derive(Debug, Clone)]
pub struct ChatLog {
    pool: SqlitePool,
}

/// A message to be stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// A stored message, as loaded for summary assembly.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Name shown in transcripts: display name, falling back to username.
    pub fn speaker(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

/// The UTC day window `days_back` days ago: [midnight, midnight + 24h).
pub fn day_window(days_back: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = (Utc::now() - Duration::days(days_back as i64)).date_naive();
    let start = day.and_hms_opt(0, 0, 0).expect("midnight is a valid time").and_utc();
    (start, start + Duration::days(1))
}

impl ChatLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one inbound message.
    pub async fn save(&self, message: &NewMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, user_id, username, display_name, text, sent_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(message.chat_id)
        .bind(message.user_id)
        .bind(&message.username)
        .bind(&message.display_name)
        .bind(&message.text)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await
        .context("failed to persist chat message")?;

        Ok(())
    }

    /// Load the messages of one UTC day, oldest first.
    pub async fn load_day(&self, chat_id: i64, days_back: u32) -> Result<Vec<StoredMessage>> {
        let (start, end) = day_window(days_back);

        let rows = sqlx::query(
            "SELECT user_id, username, display_name, text, sent_at \
             FROM messages \
             WHERE chat_id = ? AND sent_at >= ? AND sent_at < ? \
             ORDER BY sent_at ASC",
        )
        .bind(chat_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("failed to load day messages")?;

        Ok(rows
            .into_iter()
            .map(|row| StoredMessage {
                user_id: row.try_get("user_id").unwrap_or_default(),
                username: row.try_get("username").unwrap_or_default(),
                display_name: row.try_get("display_name").unwrap_or_default(),
                text: row.try_get("text").unwrap_or_default(),
                sent_at: row.try_get("sent_at").unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    /// Count the messages of one UTC day.
    pub async fn count_day(&self, chat_id: i64, days_back: u32) -> Result<i64> {
        let (start, end) = day_window(days_back);

        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM messages \
             WHERE chat_id = ? AND sent_at >= ? AND sent_at < ?",
        )
        .bind(chat_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .context("failed to count day messages")?;

        Ok(row.try_get("total").unwrap_or(0))
    }
}
