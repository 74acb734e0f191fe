//! User-facing texts: canned replies, fallback pools, and HTML helpers.
//!
//! Everything the bot says without asking the LLM lives here, so the
//! handlers read as routing logic rather than walls of string literals.

use crate::access::{AllowedChat, ApprovalRequest};
use crate::activity::SwearerTotal;
use rand::Rng;

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// An HTML mention that links to the user even without a username.
pub fn user_mention(user_id: i64, display_name: &str) -> String {
    format!(
        r#"<a href="tg://user?id={user_id}">{}</a>"#,
        escape_html(display_name)
    )
}

/// Remove the bot's @mention from a message, leaving the actual request.
pub fn strip_bot_mention(text: &str, bot_username: &str) -> String {
    text.replace(&format!("@{bot_username}"), "")
        .replace(&format!("@{}", bot_username.to_lowercase()), "")
        .trim()
        .to_string()
}

/// Pick one entry from a fallback pool.
pub fn pick<'a>(pool: &'a [&'a str], rng: &mut impl Rng) -> &'a str {
    pool[rng.random_range(0..pool.len())]
}

// -- Approval workflow --

/// Direct message sent to each admin when a new approval request is filed.
/// Carries the literal approve/reject command lines.
pub fn approval_request_notice(
    chat_id: i64,
    title: &str,
    requester_id: i64,
    requester_name: &str,
) -> String {
    format!(
        "🔒 <b>Новый запрос доступа</b>\n\n\
         <b>Чат:</b> {} ({chat_id})\n\
         <b>Пользователь:</b> {} ({requester_id})\n\n\
         Используйте команды:\n\
         • <code>/approve {chat_id}</code> - разрешить\n\
         • <code>/reject {chat_id}</code> - отклонить\n\
         • <code>/pending</code> - показать все запросы",
        escape_html(title),
        escape_html(requester_name),
    )
}

pub const APPROVAL_REQUESTED: &str = "⌛ Доступ к этому чату не разрешен.\n\n\
     📍 Запрос на одобрение отправлен администраторам.\n\
     ⏳ Ожидайте подтверждения доступа.";

pub const NO_ACCESS: &str = "⌛ У меня нет доступа к этому чату.";

pub const HELP_NO_ACCESS: &str = "⌛ У меня нет доступа к этому чату.\n\n\
     Обратитесь к администратору для получения доступа.";

pub const NOT_ADMIN: &str = "⌛ У вас нет прав администратора.";

pub const REQUEST_NOT_FOUND: &str = "⌛ Запрос не найден или уже обработан";

pub const BAD_CHAT_ID: &str = "⌛ Неверный формат chat_id";

pub const NO_PENDING_REQUESTS: &str = "📭 Нет ожидающих запросов.";

pub fn approve_usage() -> String {
    "📍 Использование: <code>/approve &lt;chat_id&gt;</code>".to_string()
}

pub fn reject_usage() -> String {
    "📍 Использование: <code>/reject &lt;chat_id&gt;</code>".to_string()
}

pub fn approved_reply(chat_id: i64) -> String {
    format!("✅ Чат {chat_id} одобрен и добавлен в разрешенные!")
}

pub fn rejected_reply(chat_id: i64) -> String {
    format!("🚫 Запрос для чата {chat_id} отклонен.")
}

/// Admin listing of pending approval requests.
pub fn format_pending(requests: &[ApprovalRequest]) -> String {
    let mut out = String::from("📋 <b>Ожидающие запросы:</b>\n\n");
    for request in requests {
        out.push_str(&format!(
            "📍 <b>{}</b> ({})\n   👤 {} ({})\n   📅 {}\n   \
             • <code>/approve {}</code> <code>/reject {}</code>\n\n",
            escape_html(&request.title),
            request.chat_id,
            escape_html(&request.requester_name),
            request.requester_id,
            request.created_at.format("%d.%m.%Y %H:%M"),
            request.chat_id,
            request.chat_id,
        ));
    }
    out
}

/// Admin listing of allowed chats: static ids first, then approved rows.
pub fn format_allowed(static_ids: &[i64], chats: &[AllowedChat]) -> String {
    let mut out = String::from("📋 <b>Разрешенные чаты:</b>\n\n");
    for chat_id in static_ids {
        out.push_str(&format!("📍 {chat_id} <i>(из конфига)</i>\n"));
    }
    for chat in chats {
        out.push_str(&format!(
            "📍 <b>{}</b> ({})\n   📅 {}\n\n",
            escape_html(&chat.title),
            chat.chat_id,
            chat.approved_at.format("%d.%m.%Y %H:%M"),
        ));
    }
    if static_ids.is_empty() && chats.is_empty() {
        out.push_str("📭 Нет разрешенных чатов.");
    }
    out
}

// -- Welcome and help --

pub const ADMIN_WELCOME: &str = "Привет, админ! 👑\n\n\
     <b>Доступные команды:</b>\n\
     • /approve &lt;chat_id&gt; - одобрить чат\n\
     • /reject &lt;chat_id&gt; - отклонить запрос\n\
     • /pending - показать ожидающие запросы\n\
     • /allowed - список разрешенных чатов\n\
     • /help - подробная помощь\n\n\
     <b>В групповых чатах также доступны:</b>\n\
     • /roast_random - жесткий подкол случайному корешу 🔥\n\
     • /reminder_random - \"важное\" напоминание кому-то 😁\n\
     • /top_mat - топ матершинников 🤬\n\n\
     Summary доступен только в групповых чатах! 🤖";

pub const PRIVATE_WELCOME: &str = "👋 <b>Привет!</b>\n\n\
     Этот бот работает только в групповых чатах.\n\
     Добавь меня в группу и попроси резюме!\n\n\
     Используй /help для подробной информации 📖";

pub fn group_welcome(bot_username: &str) -> String {
    format!(
        "Привет! 👋\n\n\
         Я бот для создания резюме чата и общения!\n\n\
         <b>Основные команды:</b>\n\
         • @{bot_username} что было за сегодня - резюме\n\
         • @{bot_username} привет - просто поболтать\n\
         • Отвечай на мои сообщения - будем диалог вести! 💬\n\
         • /roast_random - подкол случайному корешу 🔥\n\
         • /reminder_random - напоминание кому-то 😁\n\
         • /top_mat - топ матершинников 🤬\n\n\
         Я теперь помню контекст диалогов и знаю кто есть кто в чате!\n\
         Используй /help для подробной помощи! 🤖✨"
    )
}

pub fn admin_help(bot_username: &str) -> String {
    format!(
        "🤖 <b>Помощь по боту (Админ)</b>\n\n\
         <b>Админские команды:</b>\n\
         • /approve &lt;chat_id&gt; - одобрить чат\n\
         • /reject &lt;chat_id&gt; - отклонить запрос\n\
         • /pending - показать ожидающие запросы\n\
         • /allowed - список разрешенных чатов\n\n\
         <b>В групповых чатах:</b>\n\
         • @{bot_username} что было за сегодня/вчера - резюме чата\n\
         • @{bot_username} [любое сообщение] - общение с ботом\n\
         • Отвечай на сообщения бота - веди диалог! 💬\n\
         • /roast_random - подкол случайному пользователю 🔥\n\
         • /reminder_random - напоминание кому-то 😁\n\
         • /top_mat - топ матершинников чата 🤬\n\
         • /rap_nik - генератор рэп-псевдонимов 🎤\n\n\
         Бот работает только в разрешенных групповых чатах! 🤖"
    )
}

pub fn private_help(bot_username: &str) -> String {
    format!(
        "🤖 <b>Помощь по боту</b>\n\n\
         👋 Этот бот работает только в групповых чатах!\n\n\
         Добавь меня в группу и попробуй:\n\
         • @{bot_username} что было за сегодня - резюме чата\n\
         • @{bot_username} привет - просто поболтать\n\
         • Отвечай на мои сообщения - ведем диалог! 💬\n\
         • /roast_random - подколоть кого-то 🔥\n\n\
         Я анализирую сообщения и выдам самое интересное! ✨"
    )
}

pub fn group_help(bot_username: &str) -> String {
    format!(
        "🤖 <b>Помощь по боту</b>\n\n\
         <b>Резюме чата:</b>\n\
         • @{bot_username} что было за сегодня\n\
         • @{bot_username} что было за вчера\n\
         • @{bot_username} что было за позавчера\n\
         • @{bot_username} что было за 3 дня (макс 7)\n\n\
         <b>Общение:</b>\n\
         • @{bot_username} [любое сообщение] - поболтать с ботом\n\
         • Отвечай на мои сообщения - ведем диалог! 💬\n\
         • Я помню контекст разговора и знаю всех в чате! 🧠\n\n\
         <b>Развлечения:</b>\n\
         • /roast_random - жесткий подкол случайному корешу 🔥\n\
         • /reminder_random - \"важное\" напоминание кому-то 😁\n\
         • /top_mat - топ матершинников чата 🤬\n\
         • /rap_nik - генератор рэп-псевдонимов 🎤\n\n\
         Я анализирую сообщения, делаю крутые резюме и веду живые диалоги! 🤖✨"
    )
}

// -- Summary --

pub const SUMMARY_GROUP_ONLY: &str = "⌛ Summary доступен только в групповых чатах, братан! 🤖";

pub const SUMMARY_IN_PROGRESS: &str = "Генерирую резюме... ⏳";

pub const SUMMARY_PERIOD_TOO_LONG: &str = "Могу показать резюме только за последние 7 дней 📅";

pub const SUMMARY_READ_FAILED: &str = "Ошибка при создании резюме 😞";

pub fn summary_usage(bot_username: &str) -> String {
    format!(
        "Напиши '@{bot_username} что было за сегодня/вчера/позавчера' \
         или '@{bot_username} что было за N дней' (макс 7)"
    )
}

pub fn summary_empty(period: &str) -> String {
    format!("За {period} никто ничего не писал, братан 🤷‍♂️")
}

pub fn summary_too_few(period: &str, count: usize, minimum: usize) -> String {
    format!(
        "За {period} было всего {count} сообщений - слишком мало для нормального резюме, братан 📱\n\n\
         Попробуй запросить резюме когда народ побольше пообщается! (нужно минимум {minimum} сообщений)"
    )
}

pub fn summary_reply(period: &str, summary: &str, analyzed: usize) -> String {
    format!(
        "📋 <b>Резюме за {period}</b>\n\n{summary}\n\n\
         <i>Проанализировано сообщений: {analyzed}</i>"
    )
}

// -- Entertainment --

pub const ROAST_GROUP_ONLY: &str = "⌛ Подколы только в групповых чатах!";
pub const ROAST_NOBODY: &str = "😔 Некого подколоть - в чате тишина!";
pub const ROAST_FALLBACK: &str = "Даже я не знаю как тебя подколоть, братан 😂";

pub const REMINDER_GROUP_ONLY: &str = "⌛ Напоминания только в групповых чатах!";
pub const REMINDER_NOBODY: &str = "😔 Некому напоминать - в чате тишина!";
pub const REMINDER_FALLBACK: &str = "Забыл что хотел напомнить 🤪";

pub const TOP_MAT_GROUP_ONLY: &str = "⌛ Статистика мата только в групповых чатах!";
pub const TOP_MAT_EMPTY: &str = "🤯 Невероятно! В этом чате еще никто не матерился! 😇";

pub fn reminder_reply(mention: &str, reminder: &str) -> String {
    format!("⏰ <b>Важное напоминание:</b>\n\n{mention} {reminder}")
}

pub fn surprise_reminder_reply(mention: &str, reminder: &str) -> String {
    format!("🔔 <b>Срочное напоминание:</b>\n\n{mention} {reminder}")
}

/// Medal-formatted swear leaderboard.
pub fn format_top_swearers(totals: &[SwearerTotal]) -> String {
    let medals = ["🥇", "🥈", "🥉"];
    let mut out = String::from("🤬 <b>Топ матершинников чата:</b>\n\n");
    for (i, entry) in totals.iter().enumerate() {
        let medal = medals
            .get(i)
            .map(|m| (*m).to_string())
            .unwrap_or_else(|| format!("{}.", i + 1));
        out.push_str(&format!(
            "{medal} <b>{}</b> - {} раз\n",
            escape_html(entry.speaker()),
            entry.total,
        ));
    }
    out.push_str("\n<i>Статистика ведется с момента последнего обновления бота 📊</i>");
    out
}

pub fn nickname_group_reply(mention: &str, nickname: &str) -> String {
    format!(
        "🎤 <b>Внимание! Рэп-крещение!</b>\n\n\
         {mention} отныне в хип-хоп игре известен как:\n\n\
         🔥 <b>{nickname}</b> 🔥\n\n\
         <i>Респект новой легенде андерграунда!</i> 💿"
    )
}

pub fn nickname_private_reply(nickname: &str) -> String {
    format!(
        "🎤 <b>Твой новый рэп-псевдоним:</b>\n\n\
         🔥 <b>{nickname}</b> 🔥\n\n\
         <i>Теперь ты готов покорять чарты!</i> 💿"
    )
}

// -- Fallback pools --

/// Canned comebacks when the LLM is down and the message was a provocation.
pub const ROAST_REPLIES: &[&str] = &[
    "Вау, какая оригинальность! 🥱 Года в 2005 может и засмеялись бы",
    "Серьезно? Это лучшее что ты смог придумать? 😂 Слабовато, чел",
    "Зеркало дома сломалось? 🪞 Может починишь сначала его",
    "Какой ты забавный! 🎪 Цирк тебя потерял?",
    "Ну и словарный запас! 📚 Мама гордится?",
    "Ничего, вырастешь - поумнеешь 📈 Хотя не факт",
];

/// Canned small talk when the LLM is down and the message was friendly.
pub const FRIENDLY_REPLIES: &[&str] = &[
    "Тут я, тут! Чего хотел, братан? 😎",
    "Слушаю внимательно, рассказывай 👂",
    "О, привет! Как сам вообще? 🤙",
    "Да-да, я на связи. Что за движ? 🔥",
    "Говори, кореш, я весь во внимании 🤖",
];

/// Rap nicknames used when the generator endpoint is unavailable.
pub const NICKNAME_FALLBACKS: &[&str] = &[
    "MC Error 500 feat. Глюк",
    "Young 404 Not Found",
    "Defitsit 1991",
    "Excel Killer XXL",
    "Borsch Gang 47",
];

/// Greeting pool for newly joined members. The `{name}` placeholder is
/// replaced with an HTML mention.
pub const NEW_MEMBER_GREETINGS: &[&str] = &[
    "О, привет {name}! 👋 Расскажи о себе, не стесняйся! 😏",
    "Смотрите кто к нам заглянул! 👀 {name}, надеюсь не из полиции? 🚔",
    "Ебааа, {name} в здании! 🎉 Сразу видно - человек с хорошим вкусом 😎",
    "{name} подтянулся! 💪 Братан, тут весело, оставайся! 🔥",
    "О боже, {name}! 😱 Ты случайно не тот самый легендарный парень? 🌟",
    "Здарова {name}! 🤘 Мамке не говори что тут сидишь, ладно? 🤫",
    "Вау, {name}! 🎪 Цирк потерял клоуна или ты просто в гости? 🤡",
    "{name} на связи! 📡 Надеюсь у тебя крепкие нервы, тут отрываемся по полной! 🎭",
    "Эй {name}! 🗣️ Водка есть? Нет? Ну тогда просто посиди, пообщайся! 🍻",
    "О май гад, {name}! 😲 Ты специально к нам или GPS обосрался? 🗺️",
    "{name} в чате! 🎊 Давай знакомиться, расскажи что по жизни делаешь! 💼",
    "Вот это да, {name}! 🎯 Точно не перепутал чат? Мы тут дичь творим! 🦌",
    "Добро пожаловать {name}! 🏠 Тапки снял? Проходи, располагайся! 👟",
    "Ого, {name} подъехал! 🚗 Бензин кончился или просто скучно стало? ⛽",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn escapes_html_special_characters() {
        assert_eq!(
            escape_html(r#"<b>"Вася" & Ко</b>"#),
            "&lt;b&gt;&quot;Вася&quot; &amp; Ко&lt;/b&gt;"
        );
    }

    #[test]
    fn mention_links_by_id_and_escapes_name() {
        assert_eq!(
            user_mention(42, "Вася <3"),
            r#"<a href="tg://user?id=42">Вася &lt;3</a>"#
        );
    }

    #[test]
    fn strips_bot_mention_and_trims() {
        assert_eq!(
            strip_bot_mention("@zagichak_bot что было за вчера", "zagichak_bot"),
            "что было за вчера"
        );
    }

    #[test]
    fn leaderboard_runs_out_of_medals_gracefully() {
        let totals: Vec<SwearerTotal> = (0..4i64)
            .map(|i| SwearerTotal {
                user_id: i,
                username: format!("user{i}"),
                display_name: String::new(),
                total: 10 - i,
            })
            .collect();

        let text = format_top_swearers(&totals);
        assert!(text.contains("🥇 <b>user0</b> - 10 раз"));
        assert!(text.contains("4. <b>user3</b> - 7 раз"));
    }

    #[test]
    fn pick_draws_from_the_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let choice = pick(FRIENDLY_REPLIES, &mut rng);
        assert!(FRIENDLY_REPLIES.contains(&choice));
    }
}
