//! Inbound message classification and summary-period extraction.
//!
//! Deliberately crude pattern matching, not sentiment analysis: the trigger
//! lists and the short-question heuristic are carried over verbatim because
//! the bot's observed behavior depends on their exact membership.

use regex::Regex;

/// Routing category for a mention-triggered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A chat digest request. Checked first; shadows provocation keywords
    /// when both match.
    SummaryRequest,
    /// An insult/trolling attempt, routed to a roast-style reply.
    Provocation,
    /// Anything else, routed to the friendly dialog prompt.
    Plain,
}

/// The requested summary window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub days_back: u32,
    pub label: String,
}

/// Why a period couldn't be extracted. The two cases surface different
/// user-facing messages: the 7-day cap vs. a usage hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodError {
    TooLong,
    NotFound,
}

/// Trigger-word lists driving the classifier. One data-driven set instead of
/// literals scattered over call sites; defaults preserve exact membership.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub summary_triggers: Vec<&'static str>,
    pub provocation_triggers: Vec<&'static str>,
    pub greeting_whitelist: Vec<&'static str>,
    pub swear_words: Vec<&'static str>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            summary_triggers: vec![
                "что было",
                "что происходило",
                "резюме",
                "саммари",
                "summary",
                "сегодня",
                "вчера",
                "позавчера",
                "дн",
                "день",
                "дня",
                "дней",
            ],
            provocation_triggers: vec![
                "сосал", "сосешь", "соси", "пидор", "гей", "лох", "дурак", "идиот", "тупой",
                "долбоеб", "мудак", "ебан", "дебил", "придурок", "кретин", "козел", "свинья",
                "урод", "падла", "говно", "хуй", "пизда", "ебать", "блять", "сука", "шлюха",
                "обосрался", "ублюдок", "даун", "аутист", "чмо", "лошара", "терпила",
            ],
            greeting_whitelist: vec![
                "как дела",
                "че как",
                "живой",
                "работаешь",
                "спишь",
                "ку",
                "привет",
            ],
            swear_words: vec![
                "блять", "хуй", "пизда", "ебать", "сука", "говно", "дерьмо", "мудак", "долбоеб",
                "ублюдок", "сволочь", "падла", "гавно", "хрен", "херня", "охуеть", "заебать",
                "проебать", "наебать", "пиздец", "ебаный", "хуевый", "пиздатый", "ебучий",
                "сраный", "бля", "ебло", "хуило", "пидор", "пидарас", "гандон",
            ],
        }
    }
}

/// Pure text classifier over a [`Lexicon`].
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    lexicon: Lexicon,
    period_re: Regex,
}

impl MessageClassifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon,
            period_re: Regex::new(r"(\d+)\s*дн").expect("period regex is valid"),
        }
    }

    /// Classify a mention-triggered message. Summary keywords are checked
    /// before provocation keywords; the shadowing is intentional.
    pub fn classify(&self, text: &str) -> MessageKind {
        if self.is_summary_request(text) {
            MessageKind::SummaryRequest
        } else if self.is_provocative(text) {
            MessageKind::Provocation
        } else {
            MessageKind::Plain
        }
    }

    /// Any summary trigger word short-circuits true. No negation handling.
    pub fn is_summary_request(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.lexicon
            .summary_triggers
            .iter()
            .any(|trigger| text.contains(trigger))
    }

    /// Keyword match, plus a carve-out for short question-mark messages:
    /// texts of at most 15 chars containing "?" count as provocation unless
    /// they contain a whitelisted greeting, when "?" occurs twice or the
    /// text stripped of "?" is at most 5 chars.
    pub fn is_provocative(&self, text: &str) -> bool {
        let text = text.to_lowercase();

        if self
            .lexicon
            .provocation_triggers
            .iter()
            .any(|trigger| text.contains(trigger))
        {
            return true;
        }

        if text.chars().count() <= 15 && text.contains('?') {
            if self
                .lexicon
                .greeting_whitelist
                .iter()
                .any(|greeting| text.contains(greeting))
            {
                return false;
            }

            let question_marks = text.matches('?').count();
            let stripped_len = text.replace('?', "").trim().chars().count();
            if question_marks >= 2 || (question_marks >= 1 && stripped_len <= 5) {
                return true;
            }
        }

        false
    }

    /// Swear words occurring in the text, in lexicon order.
    pub fn swear_hits<'a>(&'a self, text: &str) -> Vec<&'a str> {
        let text = text.to_lowercase();
        self.lexicon
            .swear_words
            .iter()
            .filter(|word| text.contains(*word))
            .copied()
            .collect()
    }

    /// Extract the requested summary window from the message text.
    ///
    /// Keyword days are matched longest-first so "позавчера" isn't swallowed
    /// by its "вчера" suffix; otherwise `(\d+)\s*дн` is accepted up to 7 days.
    pub fn extract_period(&self, text: &str) -> Result<Period, PeriodError> {
        let text = text.to_lowercase();

        if text.contains("сегодня") {
            return Ok(Period {
                days_back: 0,
                label: "сегодня".into(),
            });
        }
        if text.contains("позавчера") {
            return Ok(Period {
                days_back: 2,
                label: "позавчера".into(),
            });
        }
        if text.contains("вчера") {
            return Ok(Period {
                days_back: 1,
                label: "вчера".into(),
            });
        }

        let captures = self.period_re.captures(&text).ok_or(PeriodError::NotFound)?;
        let days: u32 = captures[1].parse().map_err(|_| PeriodError::TooLong)?;
        if days > 7 {
            return Err(PeriodError::TooLong);
        }

        Ok(Period {
            days_back: days,
            label: format!("{days} дней назад"),
        })
    }
}

impl Default for MessageClassifier {
    fn default() -> Self {
        Self::new(Lexicon::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_numeric_period() {
        let classifier = MessageClassifier::default();
        let period = classifier.extract_period("что было за 3 дня").unwrap();
        assert_eq!(period.days_back, 3);
        assert!(period.label.contains('3'));
    }

    #[test]
    fn caps_period_at_seven_days() {
        let classifier = MessageClassifier::default();
        assert_eq!(
            classifier.extract_period("что было за 10 дней"),
            Err(PeriodError::TooLong)
        );
    }

    #[test]
    fn missing_period_is_a_distinct_failure() {
        let classifier = MessageClassifier::default();
        assert_eq!(
            classifier.extract_period("что было за месяц"),
            Err(PeriodError::NotFound)
        );
    }

    #[test]
    fn keyword_periods_map_longest_first() {
        let classifier = MessageClassifier::default();
        assert_eq!(classifier.extract_period("за сегодня").unwrap().days_back, 0);
        assert_eq!(classifier.extract_period("за вчера").unwrap().days_back, 1);
        assert_eq!(
            classifier.extract_period("за позавчера").unwrap().days_back,
            2
        );
    }

    #[test]
    fn greeting_question_is_not_provocation() {
        let classifier = MessageClassifier::default();
        assert!(!classifier.is_provocative("привет?"));
    }

    #[test]
    fn insult_keyword_is_provocation() {
        let classifier = MessageClassifier::default();
        assert!(classifier.is_provocative("ты тупой"));
    }

    #[test]
    fn bare_question_marks_are_provocation() {
        let classifier = MessageClassifier::default();
        assert!(classifier.is_provocative("??"));
    }

    #[test]
    fn long_question_is_left_alone() {
        let classifier = MessageClassifier::default();
        assert!(!classifier.is_provocative("расскажи что нового в мире?"));
    }

    #[test]
    fn summary_shadows_provocation() {
        let classifier = MessageClassifier::default();
        // Contains both a summary trigger and an insult; summary wins.
        assert_eq!(
            classifier.classify("что было вчера, тупой бот?"),
            MessageKind::SummaryRequest
        );
    }

    #[test]
    fn plain_chat_routes_to_dialog() {
        let classifier = MessageClassifier::default();
        assert_eq!(
            classifier.classify("расскажи анекдот про программистов"),
            MessageKind::Plain
        );
    }

    #[test]
    fn swear_hits_match_each_word() {
        let classifier = MessageClassifier::default();
        let hits = classifier.swear_hits("да БЛЯТЬ, опять пиздец какой-то");
        assert!(hits.contains(&"блять"));
        assert!(hits.contains(&"пиздец"));
        // "бля" is a substring of "блять" and counts as its own hit.
        assert!(hits.contains(&"бля"));
    }
}
