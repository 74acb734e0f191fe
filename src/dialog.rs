//! Dialog thread identity, persistence, and greeting bookkeeping.
//!
//! A thread is one evolving row: each turn overwrites the "last" fields and
//! bumps the sequence number, so retrieved history is a short trailing window
//! rather than a transcript. Callers tolerate this.

use crate::error::Result;
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sqlx::{Row as _, SqlitePool};

/// Inferred grammatical gender, used to pick the address form in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Crude ending-based inference over Russian first names.
    pub fn infer(first_name: &str) -> Self {
        let name = first_name.trim().to_lowercase();
        if name.is_empty() {
            return Gender::Unknown;
        }
        if (name.ends_with('а') || name.ends_with('я') || name.ends_with('ь'))
            && !name.ends_with("ль")
        {
            return Gender::Female;
        }
        Gender::Male
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    /// The form the bot uses to address the user.
    pub fn address(self) -> &'static str {
        match self {
            Gender::Male => "братан",
            Gender::Female => "подруга",
            Gender::Unknown => "дружище",
        }
    }
}

/// Deterministic thread identity from (chat, user, first-contact time).
///
/// Collisions are only possible within the same second for the same pair,
/// which is tolerated: threads are looked up via their latest record, not by
/// strict key uniqueness.
pub fn derive_thread_id(chat_id: i64, user_id: i64, now_epoch: i64) -> String {
    format!("{chat_id}_{user_id}_{now_epoch}")
}

/// One conversational thread (a single evolving row).
#[derive(Debug, Clone)]
pub struct DialogThread {
    pub thread_id: String,
    pub chat_id: i64,
    pub user_id: i64,
    pub user_display_name: String,
    pub user_gender: Gender,
    pub last_user_text: String,
    pub last_bot_text: String,
    pub last_bot_message_id: i64,
    pub last_user_message_id: i64,
    pub sequence_number: i64,
    pub has_greeted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialogThread {
    /// Construct a fresh NEW thread for first contact. Nothing is persisted
    /// until the first turn is recorded.
    pub fn open(chat_id: i64, user_id: i64, display_name: &str, now_epoch: i64) -> Self {
        let now = Utc::now();
        Self {
            thread_id: derive_thread_id(chat_id, user_id, now_epoch),
            chat_id,
            user_id,
            user_display_name: display_name.to_string(),
            user_gender: Gender::infer(display_name),
            last_user_text: String::new(),
            last_bot_text: String::new(),
            last_bot_message_id: 0,
            last_user_message_id: 0,
            sequence_number: 0,
            has_greeted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// "Already greeted" check over retrieved history. The flag is per-turn, not
/// per-thread, so every returned entry is consulted, not just the latest.
pub fn has_greeted(history: &[DialogThread]) -> bool {
    history.iter().any(|entry| entry.has_greeted)
}

/// Thread persistence.
#[derive(Debug, Clone)]
pub struct Threads {
    pool: SqlitePool,
}

impl Threads {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the thread an incoming reply continues: the newest thread in the
    /// chat whose last bot message is the one replied to. Absence means the
    /// caller opens a fresh thread. Two near-simultaneous replies to the same
    /// bot message may both miss and open separate threads; accepted.
    pub async fn resolve_by_reply(
        &self,
        chat_id: i64,
        bot_message_id: i64,
    ) -> Result<Option<DialogThread>> {
        let row = sqlx::query(
            "SELECT * FROM dialog_threads \
             WHERE chat_id = ? AND last_bot_message_id = ? \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(chat_id)
        .bind(bot_message_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to resolve dialog thread")?;

        Ok(row.map(|row| thread_from_row(&row)))
    }

    /// Record one turn: greeting flag set from `is_first_turn`, sequence
    /// incremented, last-turn fields overwritten (insert when new).
    pub async fn record_turn(
        &self,
        thread: &DialogThread,
        user_text: &str,
        bot_text: &str,
        bot_message_id: i64,
        user_message_id: i64,
        is_first_turn: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO dialog_threads \
             (thread_id, chat_id, user_id, user_display_name, user_gender, \
              last_user_text, last_bot_text, last_bot_message_id, last_user_message_id, \
              sequence_number, has_greeted, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?) \
             ON CONFLICT(thread_id) DO UPDATE SET \
                last_user_text = excluded.last_user_text, \
                last_bot_text = excluded.last_bot_text, \
                last_bot_message_id = excluded.last_bot_message_id, \
                last_user_message_id = excluded.last_user_message_id, \
                sequence_number = dialog_threads.sequence_number + 1, \
                has_greeted = excluded.has_greeted, \
                updated_at = excluded.updated_at",
        )
        .bind(&thread.thread_id)
        .bind(thread.chat_id)
        .bind(thread.user_id)
        .bind(&thread.user_display_name)
        .bind(thread.user_gender.as_str())
        .bind(user_text)
        .bind(bot_text)
        .bind(bot_message_id)
        .bind(user_message_id)
        .bind(is_first_turn)
        .bind(thread.created_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to record dialog turn")?;

        Ok(())
    }

    /// History for a thread, sequence ascending, capped at `limit`. With
    /// single-slot storage this returns at most one entry.
    pub async fn history(&self, thread_id: &str, limit: i64) -> Result<Vec<DialogThread>> {
        let rows = sqlx::query(
            "SELECT * FROM dialog_threads WHERE thread_id = ? \
             ORDER BY sequence_number ASC LIMIT ?",
        )
        .bind(thread_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to load dialog history")?;

        Ok(rows.iter().map(thread_from_row).collect())
    }
}

fn thread_from_row(row: &sqlx::sqlite::SqliteRow) -> DialogThread {
    DialogThread {
        thread_id: row.try_get("thread_id").unwrap_or_default(),
        chat_id: row.try_get("chat_id").unwrap_or_default(),
        user_id: row.try_get("user_id").unwrap_or_default(),
        user_display_name: row.try_get("user_display_name").unwrap_or_default(),
        user_gender: Gender::parse(
            &row.try_get::<String, _>("user_gender").unwrap_or_default(),
        ),
        last_user_text: row.try_get("last_user_text").unwrap_or_default(),
        last_bot_text: row.try_get("last_bot_text").unwrap_or_default(),
        last_bot_message_id: row.try_get("last_bot_message_id").unwrap_or_default(),
        last_user_message_id: row.try_get("last_user_message_id").unwrap_or_default(),
        sequence_number: row.try_get("sequence_number").unwrap_or_default(),
        has_greeted: row.try_get("has_greeted").unwrap_or(false),
        created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
        updated_at: row.try_get("updated_at").unwrap_or_else(|_| Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn thread_id_is_deterministic() {
        assert_eq!(derive_thread_id(-1, 10, 1700000000), "-1_10_1700000000");
        assert_eq!(
            derive_thread_id(-1, 10, 1700000000),
            derive_thread_id(-1, 10, 1700000000)
        );
    }

    #[test]
    fn gender_inference_by_ending() {
        assert_eq!(Gender::infer("Ольга"), Gender::Female);
        assert_eq!(Gender::infer("Настя"), Gender::Female);
        assert_eq!(Gender::infer("Игорь"), Gender::Female);
        assert_eq!(Gender::infer("Даниль"), Gender::Male);
        assert_eq!(Gender::infer("Артем"), Gender::Male);
        assert_eq!(Gender::infer(""), Gender::Unknown);
    }

    #[tokio::test]
    async fn unresolved_reply_yields_no_thread() {
        let threads = Threads::new(db::memory_pool().await);
        assert!(threads.resolve_by_reply(-1, 555).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recorded_turn_resolves_by_bot_message() {
        let threads = Threads::new(db::memory_pool().await);
        let thread = DialogThread::open(-1, 10, "Вася", 1700000000);

        threads
            .record_turn(&thread, "привет", "здарова", 555, 100, true)
            .await
            .unwrap();

        let found = threads.resolve_by_reply(-1, 555).await.unwrap().unwrap();
        assert_eq!(found.thread_id, thread.thread_id);
        assert_eq!(found.sequence_number, 1);
        assert_eq!(found.last_bot_text, "здарова");
        assert!(found.has_greeted);

        // Other chats don't see it.
        assert!(threads.resolve_by_reply(-2, 555).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn turns_overwrite_the_single_slot() {
        let threads = Threads::new(db::memory_pool().await);
        let thread = DialogThread::open(-1, 10, "Вася", 1700000000);

        threads
            .record_turn(&thread, "привет", "здарова", 555, 100, true)
            .await
            .unwrap();
        threads
            .record_turn(&thread, "как сам?", "нормально", 556, 101, false)
            .await
            .unwrap();

        let history = threads.history(&thread.thread_id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sequence_number, 2);
        assert_eq!(history[0].last_user_text, "как сам?");
        assert_eq!(history[0].last_bot_message_id, 556);

        // The old bot message no longer resolves.
        assert!(threads.resolve_by_reply(-1, 555).await.unwrap().is_none());
        assert!(threads.resolve_by_reply(-1, 556).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn greeting_flag_is_per_turn_in_the_slot() {
        let threads = Threads::new(db::memory_pool().await);
        let thread = DialogThread::open(-1, 10, "Вася", 1700000000);

        threads
            .record_turn(&thread, "привет", "здарова", 555, 100, true)
            .await
            .unwrap();
        let history = threads.history(&thread.thread_id, 10).await.unwrap();
        assert!(has_greeted(&history));

        // A later non-first turn overwrites the flag in the slot.
        threads
            .record_turn(&thread, "ещё", "ага", 556, 101, false)
            .await
            .unwrap();
        let history = threads.history(&thread.thread_id, 10).await.unwrap();
        assert!(!has_greeted(&history));
    }
}
