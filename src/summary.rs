//! Day digests: transcript assembly, the minimum-message gate, and the
//! single LLM call per request.

use crate::chatlog::ChatLog;
use crate::classifier::Period;
use crate::error::Result;
use crate::llm::ChatCompleter;
use crate::prompts::PromptComposer;
use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row as _, SqlitePool};
use std::sync::Arc;

/// Persisted digests, one row per successful generation.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    pool: SqlitePool,
}

impl SummaryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, chat_id: i64, day: &str, summary: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_summaries (id, chat_id, day, summary) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(chat_id)
        .bind(day)
        .bind(summary)
        .execute(&self.pool)
        .await
        .context("failed to persist chat summary")?;

        Ok(())
    }

    /// The most recent digest for a chat, if any.
    pub async fn latest(&self, chat_id: i64) -> Result<Option<(String, String)>> {
        let row = sqlx::query(
            "SELECT day, summary FROM chat_summaries WHERE chat_id = ? \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load chat summary")?;

        Ok(row.map(|row| {
            (
                row.try_get("day").unwrap_or_default(),
                row.try_get("summary").unwrap_or_default(),
            )
        }))
    }
}

/// What a summary request produced. Empty and TooFew are friendly
/// empty-states, not errors, and never reach the LLM.
#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    Empty,
    TooFew { count: usize, minimum: usize },
    Generated { digest: String, analyzed: usize },
}

/// Generates day digests for a chat.
pub struct SummaryService {
    chatlog: ChatLog,
    store: SummaryStore,
    composer: Arc<PromptComposer>,
    llm: Arc<dyn ChatCompleter>,
    min_messages_for_ai: usize,
    max_tokens: u32,
}

impl SummaryService {
    pub fn new(
        chatlog: ChatLog,
        store: SummaryStore,
        composer: Arc<PromptComposer>,
        llm: Arc<dyn ChatCompleter>,
        min_messages_for_ai: usize,
        max_tokens: u32,
    ) -> Self {
        Self {
            chatlog,
            store,
            composer,
            llm,
            min_messages_for_ai,
            max_tokens,
        }
    }

    /// Produce the digest for one requested day window.
    ///
    /// An LLM failure is surfaced to the caller (the user sees an error for
    /// the read side); the persistence of the digest itself is best-effort.
    pub async fn generate(&self, chat_id: i64, period: &Period) -> Result<SummaryOutcome> {
        let messages = self.chatlog.load_day(chat_id, period.days_back).await?;

        if messages.is_empty() {
            return Ok(SummaryOutcome::Empty);
        }
        if messages.len() < self.min_messages_for_ai {
            return Ok(SummaryOutcome::TooFew {
                count: messages.len(),
                minimum: self.min_messages_for_ai,
            });
        }

        let mut transcript = String::new();
        for message in &messages {
            transcript.push_str(&format!(
                "[{}] {}: {}\n",
                message.sent_at.format("%H:%M"),
                message.speaker(),
                message.text,
            ));
        }

        let prompt =
            self.composer
                .summary(&period.label, &transcript, messages.len(), self.max_tokens)?;
        let digest = self.llm.complete(&prompt).await?;

        let day = day_key(period.days_back);
        if let Err(error) = self.store.save(chat_id, &day, &digest).await {
            tracing::warn!(%error, chat_id, day, "failed to persist summary");
        }

        Ok(SummaryOutcome::Generated {
            digest,
            analyzed: messages.len(),
        })
    }
}

/// The `YYYY-MM-DD` key of the day `days_back` days ago (UTC).
fn day_key(days_back: u32) -> String {
    let day: DateTime<Utc> = Utc::now() - Duration::days(days_back as i64);
    day.date_naive().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatlog::NewMessage;
    use crate::db;
    use crate::error::LlmError;
    use crate::prompts::Prompt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted completer: counts calls, optionally fails.
    struct ScriptedCompleter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedCompleter {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ChatCompleter for ScriptedCompleter {
        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::Request("connection refused".into()).into());
            }
            Ok("🔥 <b>Главные темы дня:</b>\n• движ - был".to_string())
        }
    }

    async fn service(
        min_messages: usize,
        completer: Arc<ScriptedCompleter>,
    ) -> (SummaryService, ChatLog, SummaryStore) {
        let pool = db::memory_pool().await;
        let chatlog = ChatLog::new(pool.clone());
        let store = SummaryStore::new(pool);
        let service = SummaryService::new(
            chatlog.clone(),
            store.clone(),
            Arc::new(PromptComposer::new()),
            completer,
            min_messages,
            1200,
        );
        (service, chatlog, store)
    }

    async fn seed(chatlog: &ChatLog, chat_id: i64, count: usize) {
        for i in 0..count {
            chatlog
                .save(&NewMessage {
                    chat_id,
                    user_id: 10 + (i as i64 % 3),
                    username: "vasya".into(),
                    display_name: "Вася".into(),
                    text: format!("сообщение номер {i}"),
                    sent_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }

    fn today() -> Period {
        Period {
            days_back: 0,
            label: "сегодня".into(),
        }
    }

    #[tokio::test]
    async fn silent_day_is_empty_without_llm_call() {
        let completer = Arc::new(ScriptedCompleter::ok());
        let (service, _, _) = service(5, completer.clone()).await;

        assert!(matches!(
            service.generate(-1, &today()).await.unwrap(),
            SummaryOutcome::Empty
        ));
        assert_eq!(completer.call_count(), 0);
    }

    #[tokio::test]
    async fn below_minimum_skips_the_llm() {
        let completer = Arc::new(ScriptedCompleter::ok());
        let (service, chatlog, store) = service(5, completer.clone()).await;
        seed(&chatlog, -1, 3).await;

        match service.generate(-1, &today()).await.unwrap() {
            SummaryOutcome::TooFew { count, minimum } => {
                assert_eq!(count, 3);
                assert_eq!(minimum, 5);
            }
            other => panic!("expected TooFew, got {other:?}"),
        }
        assert_eq!(completer.call_count(), 0);
        assert!(store.latest(-1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enough_messages_invoke_llm_once_and_persist() {
        let completer = Arc::new(ScriptedCompleter::ok());
        let (service, chatlog, store) = service(5, completer.clone()).await;
        seed(&chatlog, -1, 6).await;

        match service.generate(-1, &today()).await.unwrap() {
            SummaryOutcome::Generated { digest, analyzed } => {
                assert!(digest.contains("Главные темы"));
                assert_eq!(analyzed, 6);
            }
            other => panic!("expected Generated, got {other:?}"),
        }
        assert_eq!(completer.call_count(), 1);

        let (day, saved) = store.latest(-1).await.unwrap().unwrap();
        assert_eq!(day, day_key(0));
        assert!(saved.contains("Главные темы"));
    }

    #[tokio::test]
    async fn llm_failure_surfaces_and_persists_nothing() {
        let completer = Arc::new(ScriptedCompleter::failing());
        let (service, chatlog, store) = service(5, completer.clone()).await;
        seed(&chatlog, -1, 6).await;

        assert!(service.generate(-1, &today()).await.is_err());
        assert_eq!(completer.call_count(), 1);
        assert!(store.latest(-1).await.unwrap().is_none());
    }
}
