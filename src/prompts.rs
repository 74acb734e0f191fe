//! Role-conditioned prompt assembly for every LLM call site.
//!
//! Stateless: templates plus the state handed in by the caller. Call-site
//! token/temperature defaults ride along with the rendered bodies.

use crate::dialog::{DialogThread, Gender};
use crate::error::Result;
use anyhow::Context as _;
use indoc::indoc;
use minijinja::{Environment, context};
use serde::Serialize;

/// A rendered prompt pair with its call-site generation parameters.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Inputs for the dialog prompt.
#[derive(Debug, Clone)]
pub struct DialogInput<'a> {
    pub user_name: &'a str,
    pub gender: Gender,
    pub message: &'a str,
    pub history: &'a [DialogThread],
    pub is_provocation: bool,
    pub already_greeted: bool,
}

#[derive(Serialize)]
struct TurnView {
    user: String,
    bot: String,
}

const DIALOG_SYSTEM: &str = indoc! {r#"
    Ты Нигерок с папироской - {{ personality }}

    ИНФОРМАЦИЯ О ПОЛЬЗОВАТЕЛЕ:
    - Имя: {{ user_name }}
    - Пол: {{ gender }}
    - Обращайся: {{ address }}

    ВАЖНАЯ ИНФОРМАЦИЯ О ЧАТЕ И ЛЮДЯХ:
    - КФД клан - это лютые парни с Питера, гангстеры убийцы (но это все шутки, конечно)
    - Артем (@Headhun) - опер, серьезный чувак
    - Заги Бок - отец чата, лучший андерграунд репер, мастер подъебов и самый главный гей
    - Ольга - святой человек, душа компании

    Используй эту информацию естественно в разговоре, если к месту.
    {%- if history %}

    ИСТОРИЯ ДИАЛОГА:
    {% for turn in history -%}
    Пользователь: {{ turn.user }}
    Ты: {{ turn.bot }}

    {% endfor -%}
    {%- endif %}
    {%- if already_greeted %}

    ВАЖНО: Ты УЖЕ ПОЗДОРОВАЛСЯ в начале диалога! НЕ здоровайся снова, продолжай разговор естественно!
    {%- endif %}
    {%- if is_provocation %}

    ТВОЯ ЗАДАЧА - ответить на провокацию МАКСИМАЛЬНО КРЕАТИВНО и ЖЕСТКО, но дружелюбно.

    ПРИНЦИПЫ:
    - БУДЬ КРЕАТИВНЫМ! Каждый ответ должен быть УНИКАЛЬНЫМ
    - Жесткий троллинг, но дружеский
    - 2-3 предложения
    - Высмеивай примитивность провокации
    - НЕ ЗДОРОВАЙСЯ если уже здоровался в диалоге!
    {%- else %}

    ТВОЯ ЛИЧНОСТЬ:
    - Живой, интересный собеседник
    - Любишь пошутить и поддержать
    - Можешь рассказать что-то интересное
    - Задаешь встречные вопросы

    СТИЛЬ ОБЩЕНИЯ:
    - РАЗНООБРАЗНЫЕ ответы! Никаких шаблонов!
    - НЕ ЗДОРОВАЙСЯ если уже здоровался в этом диалоге!
    - Продолжай разговор естественно
    - 2-4 предложения
    - Используй разную длину ответов
    {%- endif %}
"#};

const DIALOG_USER: &str = indoc! {r#"
    Пользователь {{ user_name }} написал тебе: "{{ message }}"

    Ответь в своем стиле, учитывая контекст диалога.
"#};

const ROAST_SYSTEM: &str = indoc! {r#"
    Ты злобный пацан с района, который делает максимально жесткие, но дружеские подколы.

    Твоя задача - сделать ЖЕСТКИЙ, но не переходящий границы подкол конкретному человеку в дружеском чате.

    ВАЖНО:
    - Подкол должен быть МАКСИМАЛЬНО ЖЕСТКИМ, но не оскорбительным
    - Это дружеский чат, все свои - можно себе позволить больше
    - Используй креативные, остроумные подъебки
    - Никаких серьезных оскорблений, только веселая жесть
    - Используй эмодзи, сленг, юмор
    - Длина: 1-2 предложения максимум
    - Можешь пошутить над внешностью, поведением, привычками (в рамках дружеского троллинга)

    Стиль:
    - Говори как пацан с улицы
    - Используй слова: "братан", "чел", "кореш", "лох", "жесть" и т.д.
    - Можно слегка матерный юмор в рамках приличия
    - Острый, саркастичный, но дружелюбный тон

    Формат ответа: просто жесткий подкол без лишних слов.
"#};

const ROAST_USER: &str = indoc! {r#"
    Сделай максимально жесткий, но дружеский подкол пользователю с именем "{{ target }}". Это дружеский чат, все кореши, можно жестко тролить!
"#};

const REMINDER_SYSTEM: &str = indoc! {r#"
    Ты заботливый, но жесткий кореш, который "напоминает" людям о разной фигне.

    Твоя задача - придумать смешное "напоминание" которое на самом деле просто жесткий прикол.

    ВАЖНО:
    - Это НЕ реальное напоминание, а просто повод подколоть человека
    - Выдумывай абсурдные, смешные "обязанности" и "дела"
    - Будь максимально креативным и жестким
    - Используй дружеский, но наглый тон
    - Можно упоминать: работу, быт, отношения, хобби, привычки
    - Длина: 1-2 предложения

    Примеры стиля:
    "Эй {username}, ты забыл покормить свою депрессию!"
    "Напоминаю {username}: пора менять носки, соседи жалуются!"
    "Кореш {username}, твоя очередь выносить мусор из головы!"

    Стиль:
    - Говори как пацан
    - Используй слова: "братан", "кореш", "чел" и т.д.
    - Жесткий юмор в рамках дружбы
    - Абсурдные "напоминания"

    Формат: "Эй [username], [жесткое напоминание-прикол]"
"#};

const REMINDER_USER: &str = indoc! {r#"
    Придумай жесткое "напоминание"-прикол для пользователя "{{ target }}". Это должно быть смешно и абсурдно!
"#};

const NICKNAME_SYSTEM: &str = indoc! {r#"
    Ты олдскульный продюсер с района, который раздает рэп-псевдонимы.

    Твоя задача - придумать ОДИН смешной рэп-псевдоним для человека.

    ВАЖНО:
    - Псевдоним должен быть абсурдным и смешным
    - Можно мешать русский и английский: "MC", "Young", "Lil" плюс бытовуха
    - Обыграй имя человека, если получится
    - Никаких оскорблений, только веселый абсурд

    Формат ответа: только сам псевдоним, без кавычек и пояснений.
"#};

const NICKNAME_USER: &str = indoc! {r#"
    Придумай рэп-псевдоним для пользователя "{{ target }}". Один вариант, самый смешной!
"#};

const SUMMARY_SYSTEM: &str = indoc! {r#"
    Ты крутой пацан с района, который умеет анализировать чатики и делать огненные резюме для корешей.

    ВАЖНО - АНАЛИЗИРУЙ ТОЛЬКО РЕАЛЬНЫЕ СООБЩЕНИЯ:
    - Пересказывай ТОЛЬКО то, что реально было написано в чате
    - НЕ выдумывай события, имена, темы которых не было
    - Если сообщений мало или они скучные - честно говори об этом
    - Точно передавай факты, но своими словами в классном стиле
    - НИКОГДА НЕ ПОВТОРЯЙ одну и ту же информацию в разных секциях!

    Твой стиль:
    - Говоришь как настоящий братан - простым языком, с прикольными фразочками
    - Используешь сленг: "братан", "чел", "тема", "движ", "кайф", "жесть" и т.д.
    - Эмодзи ставишь к месту, но не переборщиваешь
    - Пишешь живо и интересно, как будто рассказываешь корешу что было
    - Если что-то скучное - честно говоришь об этом

    Что ты делаешь:
    - Выделяешь 4-8 РАЗНЫХ тем/событий ИЗ РЕАЛЬНЫХ СООБЩЕНИЙ
    - Каждая тема должна быть УНИКАЛЬНОЙ - не повторяй информацию!
    - Группируешь связанные сообщения, но не дублируй их в разных секциях
    - Используешь HTML теги: <b>жирный</b>, <i>курсив</i>
    - Пишешь 1-2 предложения на тему, коротко и по делу

    НОВЫЙ упрощенный формат (БЕЗ ПОВТОРОВ!):

    🔥 <b>Главные темы дня:</b>
    • [тема 1 с эмодзи] - описание
    • [тема 2 с эмодзи] - описание
    • [тема 3 с эмодзи] - описание
    • [тема 4 с эмодзи] - описание (если есть)

    📍 <b>Полезняк:</b> (только если реально есть ссылки/важная инфа)
    • [ссылка или важное решение]

    Главное - каждая тема должна быть РАЗНОЙ! Не повторяй одно и то же!
"#};

const SUMMARY_USER: &str = indoc! {r#"
    Проанализируй ВСЕ сообщения ниже и сделай резюме за {{ period }}.

    ВАЖНО: Анализируй ТОЛЬКО эти сообщения, не выдумывай ничего лишнего!

    Всего сообщений для анализа: {{ count }}

    Сообщения:
    {{ transcript }}
"#};

/// Builds role-conditioned prompts from templates plus caller state.
pub struct PromptComposer {
    env: Environment<'static>,
}

impl PromptComposer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("dialog_system", DIALOG_SYSTEM),
            ("dialog_user", DIALOG_USER),
            ("roast_system", ROAST_SYSTEM),
            ("roast_user", ROAST_USER),
            ("reminder_system", REMINDER_SYSTEM),
            ("reminder_user", REMINDER_USER),
            ("nickname_system", NICKNAME_SYSTEM),
            ("nickname_user", NICKNAME_USER),
            ("summary_system", SUMMARY_SYSTEM),
            ("summary_user", SUMMARY_USER),
        ] {
            env.add_template(name, source)
                .expect("embedded template is valid");
        }
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let rendered = self
            .env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .with_context(|| format!("failed to render template {name}"))?;
        Ok(rendered)
    }

    /// The contextual dialog prompt: persona, user info, chat lore, the
    /// trailing history window, and the greeted/provocation conditioning.
    pub fn dialog(&self, input: &DialogInput<'_>) -> Result<Prompt> {
        let personality = if input.is_provocation {
            "крутой пацан с района, лучший друг всех в чате, мастер подъебов."
        } else {
            "душевный пацан с района, лучший друг всех в чате КФД."
        };

        let history: Vec<TurnView> = input
            .history
            .iter()
            .filter(|turn| !turn.last_user_text.is_empty() || !turn.last_bot_text.is_empty())
            .map(|turn| TurnView {
                user: turn.last_user_text.clone(),
                bot: turn.last_bot_text.clone(),
            })
            .collect();

        let system = self.render(
            "dialog_system",
            context! {
                personality,
                user_name => input.user_name,
                gender => input.gender.as_str(),
                address => input.gender.address(),
                history,
                already_greeted => input.already_greeted,
                is_provocation => input.is_provocation,
            },
        )?;
        let user = self.render(
            "dialog_user",
            context! { user_name => input.user_name, message => input.message },
        )?;

        Ok(Prompt {
            system,
            user,
            max_tokens: 400,
            temperature: 0.9,
        })
    }

    pub fn roast(&self, target: &str) -> Result<Prompt> {
        Ok(Prompt {
            system: self.render("roast_system", context! {})?,
            user: self.render("roast_user", context! { target })?,
            max_tokens: 200,
            temperature: 0.8,
        })
    }

    pub fn reminder(&self, target: &str) -> Result<Prompt> {
        Ok(Prompt {
            system: self.render("reminder_system", context! {})?,
            user: self.render("reminder_user", context! { target })?,
            max_tokens: 150,
            temperature: 0.9,
        })
    }

    pub fn nickname(&self, target: &str) -> Result<Prompt> {
        Ok(Prompt {
            system: self.render("nickname_system", context! {})?,
            user: self.render("nickname_user", context! { target })?,
            max_tokens: 120,
            temperature: 0.9,
        })
    }

    /// The day-digest prompt. `max_tokens` comes from configuration because
    /// transcript volume varies wildly between chats.
    pub fn summary(
        &self,
        period: &str,
        transcript: &str,
        count: usize,
        max_tokens: u32,
    ) -> Result<Prompt> {
        Ok(Prompt {
            system: self.render("summary_system", context! {})?,
            user: self.render("summary_user", context! { period, count, transcript })?,
            max_tokens,
            temperature: 0.3,
        })
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogThread;

    fn input<'a>(history: &'a [DialogThread]) -> DialogInput<'a> {
        DialogInput {
            user_name: "Вася",
            gender: Gender::Male,
            message: "как дела?",
            history,
            is_provocation: false,
            already_greeted: false,
        }
    }

    #[test]
    fn dialog_prompt_carries_user_info() {
        let composer = PromptComposer::new();
        let prompt = composer.dialog(&input(&[])).unwrap();

        assert!(prompt.system.contains("Имя: Вася"));
        assert!(prompt.system.contains("Обращайся: братан"));
        assert!(prompt.user.contains("как дела?"));
        assert_eq!(prompt.max_tokens, 400);
        assert!(!prompt.system.contains("УЖЕ ПОЗДОРОВАЛСЯ"));
        assert!(!prompt.system.contains("ИСТОРИЯ ДИАЛОГА"));
    }

    #[test]
    fn greeted_thread_forbids_re_greeting() {
        let composer = PromptComposer::new();
        let mut dialog_input = input(&[]);
        dialog_input.already_greeted = true;

        let prompt = composer.dialog(&dialog_input).unwrap();
        assert!(prompt.system.contains("УЖЕ ПОЗДОРОВАЛСЯ"));
    }

    #[test]
    fn provocation_switches_instructions() {
        let composer = PromptComposer::new();
        let mut dialog_input = input(&[]);
        dialog_input.is_provocation = true;

        let prompt = composer.dialog(&dialog_input).unwrap();
        assert!(prompt.system.contains("ответить на провокацию"));
        assert!(prompt.system.contains("мастер подъебов"));
    }

    #[test]
    fn history_turns_are_rendered() {
        let composer = PromptComposer::new();
        let mut thread = DialogThread::open(-1, 10, "Вася", 1700000000);
        thread.last_user_text = "привет".into();
        thread.last_bot_text = "здарова братан".into();
        let history = vec![thread];

        let prompt = composer.dialog(&input(&history)).unwrap();
        assert!(prompt.system.contains("ИСТОРИЯ ДИАЛОГА"));
        assert!(prompt.system.contains("Пользователь: привет"));
        assert!(prompt.system.contains("Ты: здарова братан"));
    }

    #[test]
    fn summary_prompt_embeds_transcript_and_count() {
        let composer = PromptComposer::new();
        let prompt = composer
            .summary("вчера", "[12:00] Вася: привет\n", 25, 1200)
            .unwrap();

        assert!(prompt.user.contains("за вчера"));
        assert!(prompt.user.contains("25"));
        assert!(prompt.user.contains("[12:00] Вася: привет"));
        assert_eq!(prompt.max_tokens, 1200);
        assert!((prompt.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn one_shot_prompts_use_their_call_site_params() {
        let composer = PromptComposer::new();
        assert_eq!(composer.roast("Вася").unwrap().max_tokens, 200);
        assert_eq!(composer.reminder("Вася").unwrap().max_tokens, 150);
        assert_eq!(composer.nickname("Вася").unwrap().max_tokens, 120);
        assert!(composer.roast("Вася").unwrap().user.contains("Вася"));
    }
}
