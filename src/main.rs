//! Zagibot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

use zagibot::access::AccessControl;
use zagibot::activity::ActivitySampler;
use zagibot::chatlog::ChatLog;
use zagibot::classifier::{Lexicon, MessageClassifier};
use zagibot::dialog::Threads;
use zagibot::greetings::GreetingLedger;
use zagibot::llm::{ChatCompleter, LlmGateway};
use zagibot::prompts::PromptComposer;
use zagibot::summary::{SummaryService, SummaryStore};
use zagibot::swears::SwearCounts;
use zagibot::telegram::{BotState, TelegramNotifier};

#[derive(Parser)]
#[command(name = "zagibot")]
#[command(about = "Group-chat companion bot: summaries, dialogs, and banter")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = zagibot::config::Config::load().context("failed to load configuration")?;
    tracing::info!(
        database = %config.database_path.display(),
        bot_username = %config.bot_username,
        "configuration loaded"
    );

    let pool = zagibot::db::connect(&config.database_path)
        .await
        .context("failed to open database")?;
    tracing::info!("database ready");

    let _health = zagibot::health::start(config.port).await?;

    let bot = Bot::new(&config.telegram_token);

    let llm: Arc<dyn ChatCompleter> =
        Arc::new(LlmGateway::new(config.llm.clone()).context("failed to build LLM gateway")?);
    let composer = Arc::new(PromptComposer::new());
    let chatlog = ChatLog::new(pool.clone());
    let summary = SummaryService::new(
        chatlog.clone(),
        SummaryStore::new(pool.clone()),
        composer.clone(),
        llm.clone(),
        config.min_messages_for_ai,
        config.llm.max_tokens,
    );
    let access = AccessControl::new(
        pool.clone(),
        config.allowed_chats.clone(),
        config.admin_user_ids.clone(),
        Arc::new(TelegramNotifier::new(bot.clone())),
    );

    let state = Arc::new(BotState {
        access,
        chatlog,
        swears: SwearCounts::new(pool.clone()),
        sampler: ActivitySampler::new(pool.clone()),
        threads: Threads::new(pool.clone()),
        greetings: GreetingLedger::new(pool),
        classifier: MessageClassifier::new(Lexicon::default()),
        composer,
        llm,
        summary,
        config,
    });

    tracing::info!("bot started");
    zagibot::telegram::run(bot, state).await;

    tracing::info!("bot stopped");
    Ok(())
}
