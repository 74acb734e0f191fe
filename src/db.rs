//! SQLite connection and schema initialization.

use crate::error::Result;
use anyhow::Context as _;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;

/// Open (creating if missing) the SQLite database and ensure the schema exists.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;

    initialize(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes. Idempotent; runs at every startup.
pub async fn initialize(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            username TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL DEFAULT '',
            text TEXT NOT NULL,
            sent_at TIMESTAMP NOT NULL,
            stored_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_messages_chat_sent ON messages(chat_id, sent_at)",
        r#"
        CREATE TABLE IF NOT EXISTS allowed_chats (
            chat_id INTEGER PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            approved_by INTEGER NOT NULL,
            approved_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS approval_requests (
            id TEXT PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            requester_id INTEGER NOT NULL,
            requester_name TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        // At most one pending request per chat; INSERT OR IGNORE bounces the loser
        // of a concurrent double-submit.
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_approval_pending \
         ON approval_requests(chat_id) WHERE status = 'pending'",
        r#"
        CREATE TABLE IF NOT EXISTS swear_counts (
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            word TEXT NOT NULL,
            username TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL DEFAULT '',
            count INTEGER NOT NULL DEFAULT 1,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (chat_id, user_id, word)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS dialog_threads (
            thread_id TEXT PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            user_display_name TEXT NOT NULL DEFAULT '',
            user_gender TEXT NOT NULL DEFAULT 'unknown',
            last_user_text TEXT NOT NULL DEFAULT '',
            last_bot_text TEXT NOT NULL DEFAULT '',
            last_bot_message_id INTEGER NOT NULL DEFAULT 0,
            last_user_message_id INTEGER NOT NULL DEFAULT 0,
            sequence_number INTEGER NOT NULL DEFAULT 0,
            has_greeted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_threads_reply \
         ON dialog_threads(chat_id, last_bot_message_id)",
        r#"
        CREATE TABLE IF NOT EXISTS used_greetings (
            id TEXT PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            greeting TEXT NOT NULL,
            used_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_used_greetings_pair ON used_greetings(chat_id, user_id)",
        r#"
        CREATE TABLE IF NOT EXISTS chat_summaries (
            id TEXT PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            day TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to initialize schema")?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect");

    initialize(&pool).await.expect("schema should initialize");
    pool
}
