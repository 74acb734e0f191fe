//! Telegram transport wiring and the message routing decision tree.

use crate::access::{AccessControl, AdminAction, AdminNotifier};
use crate::activity::ActivitySampler;
use crate::chatlog::{ChatLog, NewMessage};
use crate::classifier::{MessageClassifier, MessageKind, PeriodError};
use crate::config::Config;
use crate::dialog::{self, DialogThread, Threads};
use crate::error::Result;
use crate::greetings::{self, GreetingLedger};
use crate::llm::ChatCompleter;
use crate::prompts::{DialogInput, PromptComposer};
use crate::summary::{SummaryOutcome, SummaryService};
use crate::swears::SwearCounts;
use crate::texts;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{ChatKind, MessageId, ParseMode, ReplyParameters, User};

/// Everything the handlers need, shared across handler tasks.
pub struct BotState {
    pub config: Config,
    pub access: AccessControl,
    pub chatlog: ChatLog,
    pub swears: SwearCounts,
    pub sampler: ActivitySampler,
    pub threads: Threads,
    pub greetings: GreetingLedger,
    pub classifier: MessageClassifier,
    pub composer: Arc<PromptComposer>,
    pub llm: Arc<dyn ChatCompleter>,
    pub summary: SummaryService,
}

/// Delivers admin notices as Telegram direct messages.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait::async_trait]
impl AdminNotifier for TelegramNotifier {
    async fn notify_admin(&self, admin_id: i64, text: &str) {
        if let Err(error) = self
            .bot
            .send_message(ChatId(admin_id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            tracing::warn!(%error, admin_id, "failed to notify admin");
        }
    }
}

/// Run the long-poll dispatcher until shutdown.
pub async fn run(bot: Bot, state: Arc<BotState>) {
    let handler = dptree::entry().branch(Update::filter_message().endpoint(message_handler));

    tracing::info!("starting dispatcher with long polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("dispatcher stopped");
}

async fn message_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if let Err(error) = handle_message(&bot, &msg, &state).await {
        tracing::error!(%error, chat_id = msg.chat.id.0, "error handling message");
    }
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    if let Some(joined) = msg.new_chat_members() {
        return handle_user_joined(bot, msg, state, joined).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return handle_command(bot, msg, state, user, text).await;
    }

    ingest_message(msg, state, user, text).await;
    spawn_random_action(bot.clone(), msg.chat.id, state);

    if replies_to_bot(msg, &state.config.bot_username) {
        return handle_bot_reply(bot, msg, state, user, text).await;
    }

    if text.contains(&format!("@{}", state.config.bot_username)) {
        return handle_mention(bot, msg, state, user, text).await;
    }

    Ok(())
}

// -- Ingestion --

/// Persist the message and bump swear counters. Both writes are
/// fire-and-forget: failures are logged, never surfaced to the chat.
async fn ingest_message(msg: &Message, state: &BotState, user: &User, text: &str) {
    let chat_id = msg.chat.id.0;
    if !state.access.is_allowed(chat_id).await {
        return;
    }

    let record = NewMessage {
        chat_id,
        user_id: user.id.0 as i64,
        username: user.username.clone().unwrap_or_default(),
        display_name: user.first_name.clone(),
        text: text.to_string(),
        sent_at: msg.date,
    };
    let chatlog = state.chatlog.clone();
    tokio::spawn(async move {
        if let Err(error) = chatlog.save(&record).await {
            tracing::warn!(%error, chat_id = record.chat_id, "failed to save message");
        }
    });

    if is_direct(msg) {
        return;
    }

    let hits: Vec<String> = state
        .classifier
        .swear_hits(text)
        .into_iter()
        .map(String::from)
        .collect();
    if hits.is_empty() {
        return;
    }

    let swears = state.swears.clone();
    let user_id = user.id.0 as i64;
    let username = user.username.clone().unwrap_or_default();
    let first_name = user.first_name.clone();
    tokio::spawn(async move {
        for word in hits {
            if let Err(error) = swears
                .increment(chat_id, user_id, &word, &username, &first_name)
                .await
            {
                tracing::warn!(%error, chat_id, user_id, "failed to update swear count");
            }
        }
    });
}

// -- Mention and reply dialog --

async fn handle_mention(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: &User,
    text: &str,
) -> Result<()> {
    let request = texts::strip_bot_mention(text, &state.config.bot_username);
    tracing::info!(chat_id = msg.chat.id.0, "bot mentioned");

    match state.classifier.classify(&request) {
        MessageKind::SummaryRequest => handle_summary_request(bot, msg, state, &request).await,
        kind => {
            let is_provocation = kind == MessageKind::Provocation;
            let thread = DialogThread::open(
                msg.chat.id.0,
                user.id.0 as i64,
                &display_name(user),
                msg.date.timestamp(),
            );
            // First contact: the reply may open with a greeting.
            dialog_turn(bot, msg, state, &thread, &request, is_provocation, &[], true).await
        }
    }
}

async fn handle_bot_reply(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: &User,
    text: &str,
) -> Result<()> {
    let chat_id = msg.chat.id.0;
    let replied_id = msg
        .reply_to_message()
        .map(|reply| reply.id.0 as i64)
        .unwrap_or_default();

    let thread = match state.threads.resolve_by_reply(chat_id, replied_id).await? {
        Some(thread) => thread,
        None => DialogThread::open(
            chat_id,
            user.id.0 as i64,
            &display_name(user),
            msg.date.timestamp(),
        ),
    };

    let history = state.threads.history(&thread.thread_id, 10).await?;
    let is_provocation = state.classifier.is_provocative(text);

    dialog_turn(bot, msg, state, &thread, text, is_provocation, &history, false).await
}

/// One dialog exchange: compose, complete, reply, record.
#[allow(clippy::too_many_arguments)]
async fn dialog_turn(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    thread: &DialogThread,
    user_text: &str,
    is_provocation: bool,
    history: &[DialogThread],
    is_first_turn: bool,
) -> Result<()> {
    let input = DialogInput {
        user_name: &thread.user_display_name,
        gender: thread.user_gender,
        message: user_text,
        history,
        is_provocation,
        already_greeted: dialog::has_greeted(history),
    };

    let response = match state.composer.dialog(&input) {
        Ok(prompt) => match state.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(%error, "dialog completion failed, using fallback");
                fallback_reply(is_provocation)
            }
        },
        Err(error) => {
            tracing::warn!(%error, "dialog prompt failed, using fallback");
            fallback_reply(is_provocation)
        }
    };

    let Some(sent) = send(bot, msg.chat.id, &response, false, Some(msg.id)).await else {
        return Ok(());
    };

    state
        .threads
        .record_turn(
            thread,
            user_text,
            &response,
            sent.id.0 as i64,
            msg.id.0 as i64,
            is_first_turn,
        )
        .await?;

    Ok(())
}

fn fallback_reply(is_provocation: bool) -> String {
    let mut rng = StdRng::from_os_rng();
    let pool = if is_provocation {
        texts::ROAST_REPLIES
    } else {
        texts::FRIENDLY_REPLIES
    };
    texts::pick(pool, &mut rng).to_string()
}

// -- Summary --

async fn handle_summary_request(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    request: &str,
) -> Result<()> {
    let chat_id = msg.chat.id;

    if is_direct(msg) {
        send(bot, chat_id, texts::SUMMARY_GROUP_ONLY, false, Some(msg.id)).await;
        return Ok(());
    }
    if !state.access.is_allowed(chat_id.0).await {
        return handle_unauthorized_chat(bot, msg, state).await;
    }

    let period = match state.classifier.extract_period(request) {
        Ok(period) => period,
        Err(PeriodError::TooLong) => {
            send(bot, chat_id, texts::SUMMARY_PERIOD_TOO_LONG, false, Some(msg.id)).await;
            return Ok(());
        }
        Err(PeriodError::NotFound) => {
            let hint = texts::summary_usage(&state.config.bot_username);
            send(bot, chat_id, &hint, false, Some(msg.id)).await;
            return Ok(());
        }
    };

    let status = send(bot, chat_id, texts::SUMMARY_IN_PROGRESS, false, None).await;

    let outcome = state.summary.generate(chat_id.0, &period).await;

    if let Some(status) = status {
        delete(bot, chat_id, status.id).await;
    }

    let reply = match outcome {
        Ok(SummaryOutcome::Empty) => texts::summary_empty(&period.label),
        Ok(SummaryOutcome::TooFew { count, minimum }) => {
            texts::summary_too_few(&period.label, count, minimum)
        }
        Ok(SummaryOutcome::Generated { digest, analyzed }) => {
            texts::summary_reply(&period.label, &digest, analyzed)
        }
        Err(error) => {
            tracing::error!(%error, chat_id = chat_id.0, "summary generation failed");
            texts::SUMMARY_READ_FAILED.to_string()
        }
    };

    send(bot, chat_id, &reply, true, Some(msg.id)).await;
    Ok(())
}

// -- Commands --

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: &User,
    text: &str,
) -> Result<()> {
    let mut parts = text.split_whitespace();
    let command = parts
        .next()
        .map(|token| token.split('@').next().unwrap_or(token))
        .unwrap_or_default();
    let argument = parts.next();

    match command {
        "/start" => handle_start(bot, msg, state, user).await,
        "/help" => handle_help(bot, msg, state, user).await,
        "/roast_random" => handle_roast_random(bot, msg, state).await,
        "/reminder_random" => handle_reminder_random(bot, msg, state).await,
        "/top_mat" => handle_top_mat(bot, msg, state).await,
        "/rap_nik" => handle_rap_nik(bot, msg, state, user).await,
        "/approve" => handle_decision(bot, msg, state, user, argument, true).await,
        "/reject" => handle_decision(bot, msg, state, user, argument, false).await,
        "/pending" => handle_pending(bot, msg, state, user).await,
        "/allowed" => handle_allowed(bot, msg, state, user).await,
        _ => Ok(()),
    }
}

async fn handle_start(bot: &Bot, msg: &Message, state: &BotState, user: &User) -> Result<()> {
    if is_direct(msg) {
        let welcome = if state.access.is_admin(user.id.0 as i64) {
            texts::ADMIN_WELCOME.to_string()
        } else {
            texts::PRIVATE_WELCOME.to_string()
        };
        send(bot, msg.chat.id, &welcome, true, Some(msg.id)).await;
        return Ok(());
    }

    if !state.access.is_allowed(msg.chat.id.0).await {
        return handle_unauthorized_chat(bot, msg, state).await;
    }

    let welcome = texts::group_welcome(&state.config.bot_username);
    send(bot, msg.chat.id, &welcome, true, Some(msg.id)).await;
    Ok(())
}

async fn handle_help(bot: &Bot, msg: &Message, state: &BotState, user: &User) -> Result<()> {
    let reply = if is_direct(msg) {
        if state.access.is_admin(user.id.0 as i64) {
            texts::admin_help(&state.config.bot_username)
        } else {
            texts::private_help(&state.config.bot_username)
        }
    } else if !state.access.is_allowed(msg.chat.id.0).await {
        texts::HELP_NO_ACCESS.to_string()
    } else {
        texts::group_help(&state.config.bot_username)
    };

    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

async fn handle_roast_random(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    if is_direct(msg) || !state.access.is_allowed(msg.chat.id.0).await {
        send(bot, msg.chat.id, texts::ROAST_GROUP_ONLY, false, Some(msg.id)).await;
        return Ok(());
    }

    let mut rng = StdRng::from_os_rng();
    let Some(target) = state.sampler.pick_active_user(msg.chat.id.0, &mut rng).await? else {
        send(bot, msg.chat.id, texts::ROAST_NOBODY, false, Some(msg.id)).await;
        return Ok(());
    };

    let roast = one_shot(state, state.composer.roast(target.speaker()), texts::ROAST_FALLBACK).await;
    let reply = format!("{} {roast}", texts::user_mention(target.user_id, target.speaker()));
    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

async fn handle_reminder_random(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    if is_direct(msg) || !state.access.is_allowed(msg.chat.id.0).await {
        send(bot, msg.chat.id, texts::REMINDER_GROUP_ONLY, false, Some(msg.id)).await;
        return Ok(());
    }

    let mut rng = StdRng::from_os_rng();
    let Some(target) = state.sampler.pick_active_user(msg.chat.id.0, &mut rng).await? else {
        send(bot, msg.chat.id, texts::REMINDER_NOBODY, false, Some(msg.id)).await;
        return Ok(());
    };

    let reminder = one_shot(
        state,
        state.composer.reminder(target.speaker()),
        texts::REMINDER_FALLBACK,
    )
    .await;
    let reply = texts::reminder_reply(
        &texts::user_mention(target.user_id, target.speaker()),
        &reminder,
    );
    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

async fn handle_top_mat(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    if is_direct(msg) || !state.access.is_allowed(msg.chat.id.0).await {
        send(bot, msg.chat.id, texts::TOP_MAT_GROUP_ONLY, false, Some(msg.id)).await;
        return Ok(());
    }

    let totals = state.sampler.top_swearers(msg.chat.id.0, 10).await?;
    let reply = if totals.is_empty() {
        texts::TOP_MAT_EMPTY.to_string()
    } else {
        texts::format_top_swearers(&totals)
    };

    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

async fn handle_rap_nik(bot: &Bot, msg: &Message, state: &BotState, user: &User) -> Result<()> {
    if !is_direct(msg) && !state.access.is_allowed(msg.chat.id.0).await {
        send(bot, msg.chat.id, texts::NO_ACCESS, false, Some(msg.id)).await;
        return Ok(());
    }

    let name = display_name(user);
    let nickname = match state.composer.nickname(&name) {
        Ok(prompt) => match state.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(%error, "nickname completion failed, using fallback");
                let mut rng = StdRng::from_os_rng();
                texts::pick(texts::NICKNAME_FALLBACKS, &mut rng).to_string()
            }
        },
        Err(error) => {
            tracing::warn!(%error, "nickname prompt failed, using fallback");
            let mut rng = StdRng::from_os_rng();
            texts::pick(texts::NICKNAME_FALLBACKS, &mut rng).to_string()
        }
    };

    let reply = if is_direct(msg) {
        texts::nickname_private_reply(&nickname)
    } else {
        texts::nickname_group_reply(&texts::user_mention(user.id.0 as i64, &name), &nickname)
    };

    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

/// Shared approve/reject handling: admin gate, argument validation, the
/// status transition, and the distinct not-found reply.
async fn handle_decision(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: &User,
    argument: Option<&str>,
    approve: bool,
) -> Result<()> {
    let admin_id = user.id.0 as i64;
    if !state.access.is_admin(admin_id) {
        send(bot, msg.chat.id, texts::NOT_ADMIN, false, Some(msg.id)).await;
        return Ok(());
    }

    let Some(raw) = argument else {
        let usage = if approve {
            texts::approve_usage()
        } else {
            texts::reject_usage()
        };
        send(bot, msg.chat.id, &usage, true, Some(msg.id)).await;
        return Ok(());
    };

    let Ok(chat_id) = raw.parse::<i64>() else {
        send(bot, msg.chat.id, texts::BAD_CHAT_ID, false, Some(msg.id)).await;
        return Ok(());
    };

    let outcome = if approve {
        state.access.approve(chat_id, admin_id).await?
    } else {
        state.access.reject(chat_id).await?
    };

    let reply = match outcome {
        AdminAction::NotFound => texts::REQUEST_NOT_FOUND.to_string(),
        AdminAction::Done if approve => texts::approved_reply(chat_id),
        AdminAction::Done => texts::rejected_reply(chat_id),
    };
    send(bot, msg.chat.id, &reply, false, Some(msg.id)).await;
    Ok(())
}

async fn handle_pending(bot: &Bot, msg: &Message, state: &BotState, user: &User) -> Result<()> {
    if !state.access.is_admin(user.id.0 as i64) {
        send(bot, msg.chat.id, texts::NOT_ADMIN, false, Some(msg.id)).await;
        return Ok(());
    }

    let requests = state.access.list_pending().await?;
    let reply = if requests.is_empty() {
        texts::NO_PENDING_REQUESTS.to_string()
    } else {
        texts::format_pending(&requests)
    };

    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

async fn handle_allowed(bot: &Bot, msg: &Message, state: &BotState, user: &User) -> Result<()> {
    if !state.access.is_admin(user.id.0 as i64) {
        send(bot, msg.chat.id, texts::NOT_ADMIN, false, Some(msg.id)).await;
        return Ok(());
    }

    let chats = state.access.list_allowed().await?;
    let reply = texts::format_allowed(state.access.static_allowed(), &chats);
    send(bot, msg.chat.id, &reply, true, Some(msg.id)).await;
    Ok(())
}

/// Unapproved group chat: file an approval request (when the workflow is
/// enabled) and tell the chat to wait.
async fn handle_unauthorized_chat(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    if state.config.require_approval && !is_direct(msg) {
        let title = msg.chat.title().unwrap_or("Неизвестный чат");
        let (requester_id, requester_name) = msg
            .from
            .as_ref()
            .map(|user| (user.id.0 as i64, display_name(user)))
            .unwrap_or((0, String::new()));

        if let Err(error) = state
            .access
            .request_approval(msg.chat.id.0, title, requester_id, &requester_name)
            .await
        {
            tracing::warn!(%error, chat_id = msg.chat.id.0, "failed to file approval request");
        }

        send(bot, msg.chat.id, texts::APPROVAL_REQUESTED, false, Some(msg.id)).await;
        return Ok(());
    }

    send(bot, msg.chat.id, texts::NO_ACCESS, false, Some(msg.id)).await;
    Ok(())
}

// -- Join greetings --

async fn handle_user_joined(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    joined: &[User],
) -> Result<()> {
    let chat_id = msg.chat.id.0;
    if is_direct(msg) || !state.access.is_allowed(chat_id).await {
        return Ok(());
    }

    for user in joined {
        if user.is_bot {
            continue;
        }

        let user_id = user.id.0 as i64;
        let used = state.greetings.used_for(chat_id, user_id).await?;
        let template = {
            let mut rng = StdRng::from_os_rng();
            greetings::pick_fresh(&used, &mut rng)
        };

        let greeting = template.replace("{name}", &texts::user_mention(user_id, &display_name(user)));
        if send(bot, msg.chat.id, &greeting, true, Some(msg.id)).await.is_some() {
            if let Err(error) = state.greetings.record(chat_id, user_id, template).await {
                tracing::warn!(%error, chat_id, user_id, "failed to record greeting");
            }
            tracing::info!(chat_id, user_id, "greeted new member");
        }
    }

    Ok(())
}

// -- Random roast/reminder --

/// Fire the low-probability surprise action as a detached task. Failures
/// stay inside the task's error boundary and never reach the reply path.
fn spawn_random_action(bot: Bot, chat_id: ChatId, state: &BotState) {
    if chat_id.0 > 0 {
        return;
    }

    let access = state.access.clone();
    let sampler = state.sampler.clone();
    let composer = state.composer.clone();
    let llm = state.llm.clone();

    tokio::spawn(async move {
        if let Err(error) =
            random_action(&bot, chat_id, &access, &sampler, &composer, &llm).await
        {
            tracing::warn!(%error, chat_id = chat_id.0, "random action failed");
        }
    });
}

async fn random_action(
    bot: &Bot,
    chat_id: ChatId,
    access: &AccessControl,
    sampler: &ActivitySampler,
    composer: &PromptComposer,
    llm: &Arc<dyn ChatCompleter>,
) -> Result<()> {
    let mut rng = StdRng::from_os_rng();

    // 1% of group messages trigger a surprise action.
    if rng.random_range(0..100) != 0 {
        return Ok(());
    }
    if !access.is_allowed(chat_id.0).await {
        return Ok(());
    }
    // Stay quiet unless the chat has been alive recently.
    if sampler.distinct_speakers(chat_id.0, 7).await? < 3 {
        return Ok(());
    }

    let Some(target) = sampler.pick_active_user(chat_id.0, &mut rng).await? else {
        return Ok(());
    };
    let mention = texts::user_mention(target.user_id, target.speaker());

    let reply = if rng.random_range(0..2) == 0 {
        let prompt = composer.roast(target.speaker())?;
        let roast = llm.complete(&prompt).await?;
        tracing::info!(chat_id = chat_id.0, target = target.user_id, "surprise roast");
        format!("{mention} {roast}")
    } else {
        let prompt = composer.reminder(target.speaker())?;
        let reminder = llm.complete(&prompt).await?;
        tracing::info!(chat_id = chat_id.0, target = target.user_id, "surprise reminder");
        texts::surprise_reminder_reply(&mention, &reminder)
    };

    send(bot, chat_id, &reply, true, None).await;
    Ok(())
}

// -- Shared helpers --

/// Run a one-shot prompt, substituting the call site's fallback on failure.
async fn one_shot(
    state: &BotState,
    prompt: Result<crate::prompts::Prompt>,
    fallback: &str,
) -> String {
    match prompt {
        Ok(prompt) => match state.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(%error, "completion failed, using fallback");
                fallback.to_string()
            }
        },
        Err(error) => {
            tracing::warn!(%error, "prompt render failed, using fallback");
            fallback.to_string()
        }
    }
}

/// Send a message, logging and swallowing transport errors.
async fn send(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    html: bool,
    reply_to: Option<MessageId>,
) -> Option<Message> {
    let mut request = bot.send_message(chat_id, text);
    if html {
        request = request.parse_mode(ParseMode::Html);
    }
    if let Some(id) = reply_to {
        request = request.reply_parameters(ReplyParameters::new(id));
    }

    match request.await {
        Ok(message) => Some(message),
        Err(error) => {
            tracing::warn!(%error, chat_id = chat_id.0, "failed to send message");
            None
        }
    }
}

/// Delete a message, logging and swallowing transport errors.
async fn delete(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(error) = bot.delete_message(chat_id, message_id).await {
        tracing::warn!(%error, chat_id = chat_id.0, "failed to delete message");
    }
}

fn is_direct(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Display name preference: first name, then username, then a placeholder.
fn display_name(user: &User) -> String {
    if !user.first_name.is_empty() {
        user.first_name.clone()
    } else {
        user.username.clone().unwrap_or_else(|| "Аноним".into())
    }
}

fn replies_to_bot(msg: &Message, bot_username: &str) -> bool {
    msg.reply_to_message()
        .and_then(|reply| reply.from.as_ref())
        .and_then(|sender| sender.username.as_deref())
        .map(|username| username == bot_username)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a Telegram message fixture from Bot API JSON.
    fn message_from_json(json: serde_json::Value) -> Message {
        serde_json::from_value(json).expect("fixture should deserialize")
    }

    fn group_message(text: &str) -> Message {
        message_from_json(serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": { "id": -100123i64, "type": "supergroup", "title": "Тестовый чат" },
            "from": { "id": 10, "is_bot": false, "first_name": "Вася", "username": "vasya" },
            "text": text,
        }))
    }

    fn reply_to_bot_message(text: &str, bot_username: &str) -> Message {
        message_from_json(serde_json::json!({
            "message_id": 2,
            "date": 1700000100i64,
            "chat": { "id": -100123i64, "type": "supergroup", "title": "Тестовый чат" },
            "from": { "id": 10, "is_bot": false, "first_name": "Вася" },
            "reply_to_message": {
                "message_id": 1,
                "date": 1700000000i64,
                "chat": { "id": -100123i64, "type": "supergroup", "title": "Тестовый чат" },
                "from": { "id": 99, "is_bot": true, "first_name": "Бот", "username": bot_username },
                "text": "здарова",
            },
            "text": text,
        }))
    }

    #[test]
    fn group_chat_is_not_direct() {
        assert!(!is_direct(&group_message("привет")));
    }

    #[test]
    fn private_chat_is_direct() {
        let msg = message_from_json(serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": { "id": 10i64, "type": "private", "first_name": "Вася" },
            "from": { "id": 10, "is_bot": false, "first_name": "Вася" },
            "text": "привет",
        }));
        assert!(is_direct(&msg));
    }

    #[test]
    fn detects_replies_to_the_bot() {
        let msg = reply_to_bot_message("а ты кто?", "zagichak_bot");
        assert!(replies_to_bot(&msg, "zagichak_bot"));
        assert!(!replies_to_bot(&msg, "other_bot"));
        assert!(!replies_to_bot(&group_message("привет"), "zagichak_bot"));
    }

    #[test]
    fn display_name_prefers_first_name() {
        let msg = group_message("привет");
        let user = msg.from.as_ref().unwrap();
        assert_eq!(display_name(user), "Вася");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let msg = message_from_json(serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": { "id": -100123i64, "type": "supergroup", "title": "Тест" },
            "from": { "id": 10, "is_bot": false, "first_name": "", "username": "vasya" },
            "text": "привет",
        }));
        let user = msg.from.as_ref().unwrap();
        assert_eq!(display_name(user), "vasya");
    }
}
