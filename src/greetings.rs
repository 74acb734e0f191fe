//! Join-greeting selection with a dedup ledger.
//!
//! Issued greetings are recorded per (chat, user) so a rejoining member
//! doesn't get the same line twice in a row. The ledger grows unbounded;
//! retention is operator-managed.

use crate::error::Result;
use crate::texts;
use anyhow::Context as _;
use rand::Rng;
use sqlx::{Row as _, SqlitePool};

/// Persists which greeting texts were already issued to a (chat, user) pair.
#[derive(Debug, Clone)]
pub struct GreetingLedger {
    pool: SqlitePool,
}

impl GreetingLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Greeting templates already issued to this pair.
    pub async fn used_for(&self, chat_id: i64, user_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT greeting FROM used_greetings WHERE chat_id = ? AND user_id = ?",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to load used greetings")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.try_get("greeting").ok())
            .collect())
    }

    /// Record an issued greeting template.
    pub async fn record(&self, chat_id: i64, user_id: i64, greeting: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO used_greetings (id, chat_id, user_id, greeting) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(chat_id)
        .bind(user_id)
        .bind(greeting)
        .execute(&self.pool)
        .await
        .context("failed to record greeting")?;

        Ok(())
    }
}

/// Pick a greeting template the pair hasn't seen; once the pool is
/// exhausted, the whole pool is fair game again.
pub fn pick_fresh(used: &[String], rng: &mut impl Rng) -> &'static str {
    let pool = texts::NEW_MEMBER_GREETINGS;
    let fresh: Vec<&str> = pool
        .iter()
        .filter(|candidate| !used.iter().any(|u| u == **candidate))
        .copied()
        .collect();

    if fresh.is_empty() {
        pool[rng.random_range(0..pool.len())]
    } else {
        fresh[rng.random_range(0..fresh.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[tokio::test]
    async fn ledger_round_trips_per_pair() {
        let ledger = GreetingLedger::new(db::memory_pool().await);

        ledger.record(-1, 10, "привет {name}").await.unwrap();
        ledger.record(-1, 11, "здарова {name}").await.unwrap();

        let used = ledger.used_for(-1, 10).await.unwrap();
        assert_eq!(used, vec!["привет {name}".to_string()]);
    }

    #[test]
    fn fresh_pick_avoids_used_templates() {
        let pool = texts::NEW_MEMBER_GREETINGS;
        // Mark everything but the last template as used.
        let used: Vec<String> = pool[..pool.len() - 1]
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(pick_fresh(&used, &mut rng), pool[pool.len() - 1]);
        }
    }

    #[test]
    fn exhausted_pool_resets() {
        let used: Vec<String> = texts::NEW_MEMBER_GREETINGS
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        let mut rng = StdRng::seed_from_u64(0);
        let choice = pick_fresh(&used, &mut rng);
        assert!(texts::NEW_MEMBER_GREETINGS.contains(&choice));
    }
}
