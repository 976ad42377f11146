//! Normalization of upstream payload fragments into canonical posting fields.
//!
//! Every source client funnels its idiosyncratic salary, date, and free-text
//! shapes through these pure functions so the rest of the pipeline only ever
//! sees one format.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a stored posting description.
pub const MAX_DESCRIPTION_LEN: usize = 300;
/// Maximum number of extracted requirement entries.
pub const MAX_REQUIREMENTS: usize = 3;
/// Maximum length of a single requirement entry.
const MAX_REQUIREMENT_LEN: usize = 150;

/// Placeholder shown when no salary information is present.
pub const SALARY_UNKNOWN: &str = "Не указана";
/// Placeholder requirement when extraction finds nothing usable.
pub const REQUIREMENTS_FALLBACK: &str = "Требования уточняйте на сайте";

/// General-purpose requirement keywords (experience, education, skills).
pub const GENERAL_KEYWORDS: &[&str] = &[
    "требование",
    "требуется",
    "необходимо",
    "должен",
    "должна",
    "опыт",
    "образование",
    "навыки",
    "умение",
    "знание",
];

/// Technology-heavy keyword set for IT-focused boards. Extends the general set.
pub const IT_KEYWORDS: &[&str] = &[
    "python", "java", "javascript", "js", "c++", "c#", "php", "ruby", "sql", "nosql", "docker",
    "kubernetes", "aws", "azure", "gcp", "react", "angular", "vue", "node", "django", "flask",
    "spring", "требование", "требуется", "необходимо", "должен", "должна", "опыт", "образование",
    "навыки", "умение", "знание",
];

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Strip markup tags and collapse whitespace runs.
pub fn strip_html(text: &str) -> String {
    let without_tags = tag_regex().replace_all(text, " ");
    whitespace_regex()
        .replace_all(without_tags.trim(), " ")
        .into_owned()
}

/// Map an upstream currency code to its display symbol. Rouble is the default.
pub fn currency_symbol(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "USD" => "$",
        "EUR" => "€",
        "KZT" => "₸",
        _ => "₽",
    }
}

/// Render a salary range the way every board's output is presented:
/// both bounds, a lower bound ("от ..."), an upper bound ("до ...") or the
/// "not specified" placeholder.
pub fn format_salary(from: Option<i64>, to: Option<i64>, currency: &str) -> String {
    let symbol = currency_symbol(currency);
    match (from, to) {
        (Some(from), Some(to)) => format!("{} - {} {}", from, to, symbol),
        (Some(from), None) => format!("от {} {}", from, symbol),
        (None, Some(to)) => format!("до {} {}", to, symbol),
        (None, None) => SALARY_UNKNOWN.to_string(),
    }
}

/// Publication recency bucket of a posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishedBucket {
    Today,
    Yesterday,
    DaysAgo(i64),
    /// Older than a week: rendered as dd.mm.yyyy.
    Dated(NaiveDate),
    Unknown,
}

impl PublishedBucket {
    pub fn render(&self) -> String {
        match self {
            PublishedBucket::Today => "Сегодня".to_string(),
            PublishedBucket::Yesterday => "Вчера".to_string(),
            PublishedBucket::DaysAgo(days) => format!("{} дн. назад", days),
            PublishedBucket::Dated(date) => date.format("%d.%m.%Y").to_string(),
            PublishedBucket::Unknown => "Недавно".to_string(),
        }
    }
}

/// Bucket a known publication instant relative to `now`.
pub fn bucket_published_at(published: DateTime<Utc>, now: DateTime<Utc>) -> PublishedBucket {
    let days = (now - published).num_days();
    match days {
        i64::MIN..=0 => PublishedBucket::Today,
        1 => PublishedBucket::Yesterday,
        2..=6 => PublishedBucket::DaysAgo(days),
        _ => PublishedBucket::Dated(published.with_timezone(&Local).date_naive()),
    }
}

/// Parse a date string leniently across the formats the boards actually emit
/// and bucket it. Unparseable input buckets as Unknown.
pub fn bucket_date_str(date_str: &str, now: DateTime<Utc>) -> PublishedBucket {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return PublishedBucket::Unknown;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return bucket_published_at(parsed.with_timezone(&Utc), now);
    }

    let head: String = trimmed.chars().take(19).collect();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&head, fmt) {
            return bucket_published_at(Utc.from_utc_datetime(&naive), now);
        }
    }
    let date_part: String = head.chars().take(10).collect();
    if let Ok(date) = NaiveDate::parse_from_str(&date_part, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return bucket_published_at(Utc.from_utc_datetime(&naive), now);
        }
    }

    PublishedBucket::Unknown
}

/// Bucket a unix timestamp (seconds). Zero or negative buckets as Unknown.
pub fn bucket_unix_timestamp(timestamp: i64, now: DateTime<Utc>) -> PublishedBucket {
    if timestamp <= 0 {
        return PublishedBucket::Unknown;
    }
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(published) => bucket_published_at(published, now),
        None => PublishedBucket::Unknown,
    }
}

/// Extract requirement sentences from free text.
///
/// Strips markup, splits into sentences and keeps the ones long enough to be
/// informative that mention at least one keyword. Falls back to a single
/// placeholder so downstream rendering never deals with an empty list.
pub fn extract_requirements(text: &str, keywords: &[&str]) -> Vec<String> {
    let clean = strip_html(text);
    if clean.is_empty() {
        return vec![REQUIREMENTS_FALLBACK.to_string()];
    }

    let mut requirements = Vec::new();
    for sentence in clean.split('.').take(5) {
        let sentence = sentence.trim();
        if sentence.chars().count() < 20 {
            continue;
        }
        let lower = sentence.to_lowercase();
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            let collapsed = whitespace_regex().replace_all(sentence, " ").into_owned();
            requirements.push(truncate_chars(&collapsed, MAX_REQUIREMENT_LEN));
            if requirements.len() == MAX_REQUIREMENTS {
                break;
            }
        }
    }

    if requirements.is_empty() {
        vec![REQUIREMENTS_FALLBACK.to_string()]
    } else {
        requirements
    }
}

/// Cap a description to the storage bound, appending an ellipsis marker when
/// anything was cut.
pub fn truncate_description(text: &str) -> String {
    let clean = strip_html(text);
    if clean.chars().count() <= MAX_DESCRIPTION_LEN {
        clean
    } else {
        format!("{}...", truncate_chars(&clean, MAX_DESCRIPTION_LEN))
    }
}

/// Char-boundary-safe prefix truncation.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Title normalization used by the content fingerprint: lowercase with
/// whitespace runs collapsed, so cosmetic differences don't defeat dedup.
pub fn normalize_title(title: &str) -> String {
    whitespace_regex()
        .replace_all(title.trim(), " ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn salary_both_bounds() {
        assert_eq!(
            format_salary(Some(50000), Some(70000), "RUB"),
            "50000 - 70000 ₽"
        );
    }

    #[test]
    fn salary_upper_bound_usd() {
        assert_eq!(format_salary(None, Some(80000), "USD"), "до 80000 $");
    }

    #[test]
    fn salary_lower_bound_and_unknown() {
        assert_eq!(format_salary(Some(40000), None, "rur"), "от 40000 ₽");
        assert_eq!(format_salary(None, None, "EUR"), SALARY_UNKNOWN);
    }

    #[test]
    fn currency_symbols() {
        assert_eq!(currency_symbol("usd"), "$");
        assert_eq!(currency_symbol("EUR"), "€");
        assert_eq!(currency_symbol("KZT"), "₸");
        assert_eq!(currency_symbol("RUR"), "₽");
        assert_eq!(currency_symbol(""), "₽");
    }

    #[test]
    fn bucket_now_is_today() {
        let now = Utc::now();
        assert_eq!(bucket_published_at(now, now), PublishedBucket::Today);
    }

    #[test]
    fn bucket_25_hours_ago_is_yesterday() {
        let now = Utc::now();
        let published = now - Duration::hours(25);
        assert_eq!(bucket_published_at(published, now), PublishedBucket::Yesterday);
    }

    #[test]
    fn bucket_ten_days_ago_renders_as_date() {
        let now = Utc::now();
        let published = now - Duration::days(10);
        let bucket = bucket_published_at(published, now);
        let rendered = bucket.render();
        assert!(matches!(bucket, PublishedBucket::Dated(_)));
        // dd.mm.yyyy
        assert_eq!(rendered.len(), 10);
        assert_eq!(rendered.matches('.').count(), 2);
    }

    #[test]
    fn bucket_three_days_ago() {
        let now = Utc::now();
        let published = now - Duration::days(3);
        assert_eq!(
            bucket_published_at(published, now).render(),
            "3 дн. назад"
        );
    }

    #[test]
    fn lenient_date_parsing_covers_board_formats() {
        let now = Utc::now();
        let today_iso = now.to_rfc3339();
        assert_eq!(bucket_date_str(&today_iso, now), PublishedBucket::Today);

        let plain = now.format("%Y-%m-%d").to_string();
        assert!(matches!(
            bucket_date_str(&plain, now),
            PublishedBucket::Today | PublishedBucket::Yesterday
        ));

        assert_eq!(bucket_date_str("not a date", now), PublishedBucket::Unknown);
        assert_eq!(bucket_date_str("", now), PublishedBucket::Unknown);
        assert_eq!(PublishedBucket::Unknown.render(), "Недавно");
    }

    #[test]
    fn unix_timestamp_bucketing() {
        let now = Utc::now();
        assert_eq!(
            bucket_unix_timestamp(now.timestamp(), now),
            PublishedBucket::Today
        );
        assert_eq!(bucket_unix_timestamp(0, now), PublishedBucket::Unknown);
    }

    #[test]
    fn requirement_extraction_filters_by_keyword_and_length() {
        let text = "Требуется опыт работы с клиентами от одного года. Коротко. \
                    Необходимо знание кассовой дисциплины и основ учета. \
                    Просто длинное предложение без ключевых слов тут вообще.";
        let reqs = extract_requirements(text, GENERAL_KEYWORDS);
        assert_eq!(reqs.len(), 2);
        assert!(reqs[0].contains("опыт работы"));
        assert!(reqs[1].contains("знание кассовой"));
    }

    #[test]
    fn requirement_extraction_falls_back_on_empty() {
        assert_eq!(
            extract_requirements("", GENERAL_KEYWORDS),
            vec![REQUIREMENTS_FALLBACK.to_string()]
        );
        assert_eq!(
            extract_requirements("Ничего похожего.", GENERAL_KEYWORDS),
            vec![REQUIREMENTS_FALLBACK.to_string()]
        );
    }

    #[test]
    fn requirement_extraction_strips_markup() {
        let text = "<p>Требуется <b>опыт</b> продаж и работы с возражениями</p>";
        let reqs = extract_requirements(text, GENERAL_KEYWORDS);
        assert!(reqs[0].contains("опыт продаж"));
        assert!(!reqs[0].contains('<'));
    }

    #[test]
    fn description_truncation_appends_marker() {
        let short = "Обычное описание.";
        assert_eq!(truncate_description(short), "Обычное описание.");

        let long = "х".repeat(400);
        let truncated = truncate_description(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), MAX_DESCRIPTION_LEN + 3);
    }

    #[test]
    fn title_normalization_for_fingerprints() {
        assert_eq!(
            normalize_title("  Бариста   в кофейню "),
            "бариста в кофейню"
        );
    }
}
