//! Configuration loading and validation.

use crate::error::{ConfigError, Result};

/// Zagibot configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot API token.
    pub telegram_token: String,

    /// Bot username without the leading `@`, used for mention detection.
    pub bot_username: String,

    /// SQLite database file path.
    pub database_path: std::path::PathBuf,

    /// Port for the liveness probe server.
    pub port: u16,

    /// Chat ids always allowed regardless of persisted approvals.
    pub allowed_chats: Vec<i64>,

    /// User ids with admin rights over the approval workflow.
    pub admin_user_ids: Vec<i64>,

    /// Whether unapproved group chats trigger the approval workflow.
    pub require_approval: bool,

    /// LLM endpoint configuration.
    pub llm: LlmConfig,

    /// Minimum message count before a day summary is sent to the LLM.
    pub min_messages_for_ai: usize,
}

/// LLM endpoint configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key sent as a bearer token.
    pub api_key: String,

    /// Base URL of the completions endpoint, without the `/chat/completions` suffix.
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Max tokens for the summary call site.
    pub max_tokens: u32,
}

impl Config {
    /// Load configuration from environment variables, applying defaults.
    pub fn load() -> Result<Self> {
        let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingKey("TELEGRAM_BOT_TOKEN".into()))?;

        let port = env_or("PORT", "8080")
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid("PORT must be a port number".into()))?;

        let llm = LlmConfig {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            max_tokens: parse_or("OPENAI_MAX_TOKENS", 1200),
        };

        Ok(Self {
            telegram_token,
            bot_username: env_or("BOT_USERNAME", "zagichak_bot"),
            database_path: env_or("DATABASE_PATH", "./zagibot.db").into(),
            port,
            allowed_chats: parse_id_list(&std::env::var("ALLOWED_CHATS").unwrap_or_default()),
            admin_user_ids: parse_id_list(&std::env::var("ADMIN_USER_IDS").unwrap_or_default()),
            require_approval: env_or("REQUIRE_APPROVAL", "true") == "true",
            llm,
            min_messages_for_ai: parse_or("MIN_MESSAGES_FOR_AI", 20),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// Parse a numeric env var, falling back to the default on absence or junk.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated id list, skipping entries that don't parse.
fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_skips_junk_entries() {
        assert_eq!(
            parse_id_list("-100123, 456,, oops , 789"),
            vec![-100123, 456, 789]
        );
    }

    #[test]
    fn id_list_empty_input() {
        assert!(parse_id_list("").is_empty());
    }
}
