//! SuperJob vacancies API client.
//!
//! Authenticates with a static application key in the `X-Api-App-Id` header.
//! A 403 from this upstream is unrecoverable without new credentials, so it
//! surfaces as an informational posting instead of silently returning nothing.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{tier_info_posting, RateLimiter, SourceClient, SourceFetch, API_USER_AGENT};
use crate::models::{ExternalPosting, FetchOutcome, Source};
use crate::normalize::{
    bucket_unix_timestamp, extract_requirements, format_salary, truncate_description,
    GENERAL_KEYWORDS,
};

const BASE_URL: &str = "https://api.superjob.ru/2.0";
const ACCESS_INFO_URL: &str = "https://api.superjob.ru/register";

/// SuperJob town ids. Defaults to Moscow.
fn town_id(city: &str) -> u32 {
    match city {
        "Москва" => 4,
        "Санкт-Петербург" => 2,
        "Екатеринбург" => 12,
        "Новосибирск" => 9,
        "Казань" => 88,
        "Краснодар" => 53,
        "Нижний Новгород" => 66,
        "Челябинск" => 104,
        "Самара" => 78,
        "Уфа" => 99,
        "Ростов-на-Дону" => 76,
        "Омск" => 68,
        "Красноярск" => 54,
        "Воронеж" => 26,
        "Пермь" => 72,
        "Волгоград" => 24,
        _ => 4,
    }
}

pub struct SuperJobClient {
    client: Client,
    limiter: RateLimiter,
    api_key: Option<String>,
    base_url: String,
}

impl SuperJobClient {
    pub fn new(limiter: RateLimiter, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent(API_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            limiter,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn request(
        &self,
        api_key: &str,
        query: &str,
        city: &str,
        limit: usize,
    ) -> Result<Value, FetchOutcome> {
        self.limiter.acquire(Source::SuperJob).await;

        let response = self
            .client
            .get(format!("{}/vacancies/", self.base_url))
            .header("X-Api-App-Id", api_key)
            .query(&[
                ("keyword", query),
                ("town", &town_id(city).to_string()),
                ("count", &limit.to_string()),
                ("page", "0"),
                ("order_field", "date"),
                ("order_direction", "desc"),
            ])
            .send()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            429 => return Err(FetchOutcome::RateLimited),
            401 | 403 => return Err(FetchOutcome::AuthFailed),
            s if !status.is_success() => {
                return Err(FetchOutcome::UpstreamError(format!("HTTP {}", s)))
            }
            _ => {}
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))
    }

    fn parse_item(item: &Value, default_city: &str, now: chrono::DateTime<Utc>) -> Option<ExternalPosting> {
        let title = item.get("profession")?.as_str()?.trim();
        if title.is_empty() {
            return None;
        }
        let id = item.get("id").and_then(Value::as_i64)?;

        // SuperJob reports absent bounds as zero.
        let payment_from = item
            .get("payment_from")
            .and_then(Value::as_i64)
            .filter(|v| *v > 0);
        let payment_to = item
            .get("payment_to")
            .and_then(Value::as_i64)
            .filter(|v| *v > 0);
        let currency = item
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("rub");
        let salary = format_salary(payment_from, payment_to, currency);

        let url = item
            .get("link")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://www.superjob.ru/vakansii/{}.html", id));

        let description_text = item
            .get("candidat")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| item.get("work").and_then(Value::as_str))
            .unwrap_or("");

        let published = item
            .get("date_published")
            .and_then(Value::as_i64)
            .map(|ts| bucket_unix_timestamp(ts, now).render())
            .unwrap_or_else(|| "Недавно".to_string());

        Some(ExternalPosting {
            source: Source::SuperJob,
            source_id: Some(id.to_string()),
            title: title.to_string(),
            company: item
                .get("firm_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            salary,
            city: item
                .pointer("/town/title")
                .and_then(Value::as_str)
                .unwrap_or(default_city)
                .to_string(),
            url,
            description: truncate_description(description_text),
            requirements: extract_requirements(description_text, GENERAL_KEYWORDS),
            published,
            is_info: false,
            raw_payload: item.clone(),
        })
    }
}

#[async_trait]
impl SourceClient for SuperJobClient {
    fn source(&self) -> Source {
        Source::SuperJob
    }

    async fn fetch(&self, query: &str, city: &str, limit: usize) -> SourceFetch {
        info!("Searching SuperJob: '{}' in {}", query, city);

        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => {
                warn!("SuperJob API key not configured");
                return SourceFetch {
                    postings: vec![tier_info_posting(Source::SuperJob, query, city, ACCESS_INFO_URL)],
                    outcome: FetchOutcome::AuthFailed,
                };
            }
        };

        let mut result = self.request(api_key, query, city, limit).await;
        if matches!(result, Err(FetchOutcome::RateLimited)) {
            self.limiter.backoff(Source::SuperJob).await;
            result = self.request(api_key, query, city, limit).await;
        }

        let data = match result {
            Ok(data) => data,
            Err(FetchOutcome::AuthFailed) => {
                // Static application key: nothing to refresh, surface the lockout.
                warn!("SuperJob rejected the application key");
                return SourceFetch {
                    postings: vec![tier_info_posting(Source::SuperJob, query, city, ACCESS_INFO_URL)],
                    outcome: FetchOutcome::AuthFailed,
                };
            }
            Err(outcome) => {
                warn!("SuperJob fetch failed: {}", outcome.describe());
                return SourceFetch::failed(outcome);
            }
        };

        let items = match data.get("objects").and_then(Value::as_array) {
            Some(items) => items,
            None => {
                warn!("SuperJob response missing 'objects'");
                return SourceFetch::failed(FetchOutcome::ParseDrift);
            }
        };

        let now = Utc::now();
        let postings: Vec<ExternalPosting> = items
            .iter()
            .filter_map(|item| Self::parse_item(item, city, now))
            .take(limit)
            .collect();

        debug!("SuperJob returned {} postings", postings.len());
        SourceFetch::ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_item_maps_the_api_shape() {
        let now = Utc::now();
        let item = json!({
            "id": 4581,
            "profession": "Продавец-кассир",
            "firm_name": "Магазин у дома",
            "payment_from": 45000,
            "payment_to": 0,
            "currency": "rub",
            "town": {"title": "Казань"},
            "candidat": "Требуется опыт работы с кассой и программой учета. Желательно образование.",
            "date_published": now.timestamp()
        });

        let posting = SuperJobClient::parse_item(&item, "Москва", now).unwrap();
        assert_eq!(posting.source_id.as_deref(), Some("4581"));
        // Zero upper bound means "from" only.
        assert_eq!(posting.salary, "от 45000 ₽");
        assert_eq!(posting.city, "Казань");
        assert_eq!(posting.url, "https://www.superjob.ru/vakansii/4581.html");
        assert_eq!(posting.published, "Сегодня");
        assert!(posting.requirements[0].contains("опыт работы"));
    }

    #[test]
    fn parse_item_skips_empty_titles() {
        let now = Utc::now();
        assert!(SuperJobClient::parse_item(&json!({"profession": "", "id": 1}), "Москва", now).is_none());
        assert!(SuperJobClient::parse_item(&json!({"id": 2}), "Москва", now).is_none());
    }

    #[tokio::test]
    async fn missing_key_yields_info_posting() {
        let client = SuperJobClient::new(RateLimiter::new(), None);
        let fetch = client.fetch("бариста", "Москва", 5).await;
        assert_eq!(fetch.outcome, FetchOutcome::AuthFailed);
        assert_eq!(fetch.postings.len(), 1);
        assert!(fetch.postings[0].is_info);
        assert_eq!(fetch.postings[0].source_tag(), "superjob_info");
    }

    #[test]
    fn town_ids_default_to_moscow() {
        assert_eq!(town_id("Казань"), 88);
        assert_eq!(town_id("Глушь"), 4);
    }
}
