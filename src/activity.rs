//! Active-user sampling and chat statistics queries.

use crate::error::Result;
use anyhow::Context as _;
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::{Row as _, SqlitePool};

/// A candidate for roast/reminder targeting.
#[derive(Debug, Clone)]
pub struct ActiveUser {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub message_count: i64,
}

impl ActiveUser {
    pub fn speaker(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

/// Per-user aggregated swear total for the leaderboard.
#[derive(Debug, Clone)]
pub struct SwearerTotal {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub total: i64,
}

impl SwearerTotal {
    pub fn speaker(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

/// Samples recently active users and aggregates chat statistics.
///
/// Randomness is injected by the caller so tests can drive selection with a
/// seeded generator.
#[derive(Debug, Clone)]
pub struct ActivitySampler {
    pool: SqlitePool,
}

impl ActivitySampler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Pick one active user uniformly at random (not weighted by count).
    ///
    /// Primary window: 14 trailing days, at least 2 messages, top 30 by
    /// count. Fallback: 30 days, no minimum, top 20. `None` when the chat is
    /// silent either way — callers show a friendly empty-state message.
    pub async fn pick_active_user(
        &self,
        chat_id: i64,
        rng: &mut impl Rng,
    ) -> Result<Option<ActiveUser>> {
        let mut candidates = self.candidates(chat_id, 14, 2, 30).await?;
        if candidates.is_empty() {
            candidates = self.candidates(chat_id, 30, 0, 20).await?;
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let index = rng.random_range(0..candidates.len());
        Ok(Some(candidates.swap_remove(index)))
    }

    async fn candidates(
        &self,
        chat_id: i64,
        days: i64,
        min_messages: i64,
        limit: i64,
    ) -> Result<Vec<ActiveUser>> {
        let cutoff = Utc::now() - Duration::days(days);

        let rows = sqlx::query(
            "SELECT user_id, username, display_name, COUNT(*) AS message_count \
             FROM messages \
             WHERE chat_id = ? AND sent_at >= ? \
               AND (username != '' OR display_name != '') \
             GROUP BY user_id, username, display_name \
             HAVING COUNT(*) >= ? \
             ORDER BY message_count DESC \
             LIMIT ?",
        )
        .bind(chat_id)
        .bind(cutoff)
        .bind(min_messages)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to query active users")?;

        Ok(rows
            .into_iter()
            .map(|row| ActiveUser {
                user_id: row.try_get("user_id").unwrap_or_default(),
                username: row.try_get("username").unwrap_or_default(),
                display_name: row.try_get("display_name").unwrap_or_default(),
                message_count: row.try_get("message_count").unwrap_or(0),
            })
            .collect())
    }

    /// Distinct users who wrote anything in the trailing window. Gates the
    /// random roast/reminder so it stays quiet in near-dead chats.
    pub async fn distinct_speakers(&self, chat_id: i64, days: i64) -> Result<i64> {
        let cutoff = Utc::now() - Duration::days(days);

        let row = sqlx::query(
            "SELECT COUNT(DISTINCT user_id) AS speakers \
             FROM messages WHERE chat_id = ? AND sent_at >= ?",
        )
        .bind(chat_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .context("failed to count distinct speakers")?;

        Ok(row.try_get("speakers").unwrap_or(0))
    }

    /// Swear totals per user, heaviest first, capped at `limit`. Empty is a
    /// normal outcome, not an error.
    pub async fn top_swearers(&self, chat_id: i64, limit: i64) -> Result<Vec<SwearerTotal>> {
        let rows = sqlx::query(
            "SELECT user_id, username, display_name, SUM(count) AS total \
             FROM swear_counts \
             WHERE chat_id = ? \
             GROUP BY user_id, username, display_name \
             ORDER BY total DESC \
             LIMIT ?",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to aggregate swear counts")?;

        Ok(rows
            .into_iter()
            .map(|row| SwearerTotal {
                user_id: row.try_get("user_id").unwrap_or_default(),
                username: row.try_get("username").unwrap_or_default(),
                display_name: row.try_get("display_name").unwrap_or_default(),
                total: row.try_get("total").unwrap_or(0),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatlog::{ChatLog, NewMessage};
    use crate::db;
    use crate::swears::SwearCounts;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    async fn seed_messages(log: &ChatLog, chat_id: i64, user_id: i64, name: &str, count: usize) {
        for i in 0..count {
            log.save(&NewMessage {
                chat_id,
                user_id,
                username: name.to_string(),
                display_name: String::new(),
                text: format!("сообщение {i}"),
                sent_at: Utc::now(),
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn single_candidate_is_picked_with_certainty() {
        let pool = db::memory_pool().await;
        let log = ChatLog::new(pool.clone());
        let sampler = ActivitySampler::new(pool);

        seed_messages(&log, -1, 10, "vasya", 2).await;

        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = sampler.pick_active_user(-1, &mut rng).await.unwrap().unwrap();
            assert_eq!(picked.user_id, 10);
            assert_eq!(picked.speaker(), "vasya");
        }
    }

    #[tokio::test]
    async fn single_message_user_surfaces_via_fallback_window() {
        let pool = db::memory_pool().await;
        let log = ChatLog::new(pool.clone());
        let sampler = ActivitySampler::new(pool);

        // One message misses the >= 2 floor of the primary window but the
        // 30-day fallback has no floor.
        seed_messages(&log, -1, 10, "vasya", 1).await;

        let mut rng = StdRng::seed_from_u64(0);
        let picked = sampler.pick_active_user(-1, &mut rng).await.unwrap().unwrap();
        assert_eq!(picked.user_id, 10);
    }

    #[tokio::test]
    async fn silent_chat_yields_none() {
        let pool = db::memory_pool().await;
        let sampler = ActivitySampler::new(pool);

        let mut rng = StdRng::seed_from_u64(0);
        assert!(sampler.pick_active_user(-1, &mut rng).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nameless_users_are_never_candidates() {
        let pool = db::memory_pool().await;
        let log = ChatLog::new(pool.clone());
        let sampler = ActivitySampler::new(pool);

        seed_messages(&log, -1, 10, "", 3).await;

        let mut rng = StdRng::seed_from_u64(0);
        assert!(sampler.pick_active_user(-1, &mut rng).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counts_distinct_speakers() {
        let pool = db::memory_pool().await;
        let log = ChatLog::new(pool.clone());
        let sampler = ActivitySampler::new(pool);

        seed_messages(&log, -1, 10, "vasya", 2).await;
        seed_messages(&log, -1, 11, "petya", 1).await;
        seed_messages(&log, -2, 12, "other", 5).await;

        assert_eq!(sampler.distinct_speakers(-1, 7).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn swear_leaderboard_sums_and_ranks() {
        let pool = db::memory_pool().await;
        let counts = SwearCounts::new(pool.clone());
        let sampler = ActivitySampler::new(pool);

        counts.increment(-1, 10, "блять", "vasya", "").await.unwrap();
        counts.increment(-1, 10, "сука", "vasya", "").await.unwrap();
        counts.increment(-1, 11, "сука", "petya", "Петя").await.unwrap();

        let top = sampler.top_swearers(-1, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 10);
        assert_eq!(top[0].total, 2);
        assert_eq!(top[1].speaker(), "Петя");

        assert!(sampler.top_swearers(-9, 10).await.unwrap().is_empty());
    }
}
