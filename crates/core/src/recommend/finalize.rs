//! Post-processing of the narrative once the generator is done.

use crate::catalog::CountryRecord;
use crate::exchange::ExchangeRateInfo;
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_SLOGAN: &str = "랜덤한 척 하는 미친 AI 알고리즘";
pub const DEFAULT_MIN_NARRATIVE_CHARS: usize = 150;

const CLOSING_LINE: &str = "(참고로 이 추천 생성하느라 서버비 0.03원 썼어… 😭)";
const CLOSING_MARKERS: [&str; 2] = ["서버비", "0.03원"];

const PITCH: &str =
    "마구잡이 추천같지만, 사실은 미친 AI 알고리즘이 열심히 계산한 거예요. 축제, 환율, 계절, 너의 취향까지 다 고려했어요.";
const PITCH_TAIL: &str = "그냥 '느낌'으로 뽑힌 것 같지? 알고리즘이 열일한 거야… 아마도… 😏";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub narrative: String,
    pub slogan: String,
    /// Set when nothing usable arrived; the caller emits it as a `content` event.
    pub fallback_content: Option<String>,
}

fn headline(country: &CountryRecord) -> String {
    format!("오늘은 {} 추천! {}", country.display_name, country.flag_glyph)
}

fn exchange_sentence(exchange: Option<&ExchangeRateInfo>) -> String {
    match exchange {
        Some(info) => format!("지금 {}니까 여행하기 좋은 시기야!", info.display),
        None => "여행하기 좋은 시기야!".to_string(),
    }
}

/// Narrative used when the generator produced no text.
pub fn fallback_narrative(country: &CountryRecord, exchange: Option<&ExchangeRateInfo>) -> String {
    format!(
        "{}\n\n{}\n\n{PITCH} {PITCH_TAIL}",
        headline(country),
        exchange_sentence(exchange)
    )
}

/// Complete narrative used when the generator could not be reached at all.
pub fn unavailable_narrative(country: &CountryRecord) -> String {
    format!("{}\n\n{PITCH} {PITCH_TAIL}\n\n{CLOSING_LINE}", headline(country))
}

fn slogan_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            // `[:\s]+` may cross a line break, so "슬로건:\n..." still captures the next line.
            Regex::new(r"슬로건[:\s]+(.+)").ok()
        })
        .as_ref()
}

/// Pulls the first slogan line out of `text`. Returns the remaining text and the slogan,
/// with surrounding quotes removed. The whole marker line is dropped from the text.
pub fn extract_slogan(text: &str) -> (String, Option<String>) {
    let Some(caps) = slogan_pattern().and_then(|re| re.captures(text)) else {
        return (text.trim().to_string(), None);
    };
    let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
        return (text.trim().to_string(), None);
    };

    let slogan = value
        .as_str()
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’' | '*'))
        .trim()
        .to_string();

    let line_start = text[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[whole.end()..]
        .find('\n')
        .map_or(text.len(), |i| whole.end() + i + 1);
    let mut rest = String::with_capacity(text.len());
    rest.push_str(&text[..line_start]);
    rest.push_str(&text[line_end..]);

    let slogan = (!slogan.is_empty()).then_some(slogan);
    (rest.trim().to_string(), slogan)
}

/// Turns the raw streamed text into the final narrative:
/// fallback when empty, slogan extraction, length backfill, closing line.
pub fn finalize(
    raw: &str,
    country: &CountryRecord,
    exchange: Option<&ExchangeRateInfo>,
    min_chars: usize,
) -> Finalized {
    let (fallback_content, source) = if raw.trim().is_empty() {
        let fallback = fallback_narrative(country, exchange);
        (Some(fallback.clone()), fallback)
    } else {
        (None, raw.to_string())
    };

    let (mut narrative, slogan) = extract_slogan(&source);

    if fallback_content.is_none() && narrative.chars().count() < min_chars {
        narrative = format!(
            "{}\n\n{}\n\n{narrative}\n\n{PITCH}",
            headline(country),
            exchange_sentence(exchange)
        );
    }

    if !CLOSING_MARKERS.iter().any(|m| narrative.contains(m)) {
        narrative.push_str("\n\n");
        narrative.push_str(CLOSING_LINE);
    }

    Finalized {
        narrative,
        slogan: slogan.unwrap_or_else(|| DEFAULT_SLOGAN.to_string()),
        fallback_content,
    }
}
