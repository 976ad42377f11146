//! Upstream job-board integrations.
//!
//! Each client fetches postings for a (query, city) pair and resolves to a
//! `SourceFetch`: the normalized postings plus a `FetchOutcome` describing how
//! the fetch went. Clients never return errors to the coordinator; every
//! failure mode is contained here.

pub mod avito;
pub mod habr;
pub mod headhunter;
pub mod rate_limiter;
pub mod superjob;
pub mod token_cache;

pub use avito::AvitoScraper;
pub use habr::HabrClient;
pub use headhunter::HhClient;
pub use rate_limiter::RateLimiter;
pub use superjob::SuperJobClient;
pub use token_cache::TokenCache;

use async_trait::async_trait;

use crate::models::{ExternalPosting, FetchOutcome, Source};

/// Result of one source fetch: normalized postings and the outcome.
#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub postings: Vec<ExternalPosting>,
    pub outcome: FetchOutcome,
}

impl SourceFetch {
    pub fn ok(postings: Vec<ExternalPosting>) -> Self {
        Self {
            postings,
            outcome: FetchOutcome::Ok,
        }
    }

    pub fn failed(outcome: FetchOutcome) -> Self {
        Self {
            postings: Vec::new(),
            outcome,
        }
    }
}

/// One upstream integration.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch and normalize up to `limit` postings for the query/city pair.
    /// Must not panic and must not return early through an error path; all
    /// failures resolve into the returned `FetchOutcome`.
    async fn fetch(&self, query: &str, city: &str, limit: usize) -> SourceFetch;
}

/// Browser user agents rotated on scraped requests to reduce block risk.
/// Best-effort only; never a correctness requirement.
const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Pick a browser user agent for the next scraped request.
pub(crate) fn rotating_user_agent() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    BROWSER_USER_AGENTS[nanos % BROWSER_USER_AGENTS.len()]
}

/// Default user agent for the credentialed API clients.
pub(crate) const API_USER_AGENT: &str = "GWork/0.3 (candidate sourcing)";

/// Build the synthetic informational posting surfaced when an upstream locks
/// the integration behind a paid tier or rejects the credentials outright.
pub(crate) fn tier_info_posting(source: Source, query: &str, city: &str, url: &str) -> ExternalPosting {
    ExternalPosting {
        source,
        source_id: None,
        title: format!("🔒 Для поиска на {} требуется доступ", source.display_name()),
        company: Some(format!("{} API", source.display_name())),
        salary: "Требуется подключение".to_string(),
        city: city.to_string(),
        url: url.to_string(),
        description: format!(
            "Поиск вакансий «{}» через {} сейчас недоступен: апстрим требует платный тариф или действующие учетные данные.",
            query,
            source.display_name()
        ),
        requirements: vec![
            "Активный тариф с доступом к API".to_string(),
            "Подключение API в личном кабинете".to_string(),
        ],
        published: "—".to_string(),
        is_info: true,
        raw_payload: serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotating_user_agent_is_a_browser() {
        let ua = rotating_user_agent();
        assert!(ua.contains("Mozilla"));
    }

    #[test]
    fn tier_info_posting_is_marked_informational() {
        let posting = tier_info_posting(
            Source::Avito,
            "бариста",
            "Москва",
            "https://www.avito.ru/business/tools/api",
        );
        assert!(posting.is_info);
        assert!(posting.source_id.is_none());
        assert_eq!(posting.source_tag(), "avito_info");
        assert!(posting.description.contains("бариста"));
    }
}
