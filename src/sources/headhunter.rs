//! HeadHunter (hh.ru) vacancies API client.
//!
//! The public vacancies endpoint needs no credentials; requests carry only an
//! identifying user agent. Region targeting uses hh.ru's numeric area ids.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{RateLimiter, SourceClient, SourceFetch, API_USER_AGENT};
use crate::models::{ExternalPosting, FetchOutcome, Source};
use crate::normalize::{
    bucket_date_str, extract_requirements, format_salary, strip_html, truncate_description,
    GENERAL_KEYWORDS, SALARY_UNKNOWN,
};

const BASE_URL: &str = "https://api.hh.ru";

/// hh.ru area ids for the cities the bot targets. Defaults to Moscow.
fn area_id(city: &str) -> &'static str {
    match city {
        "Москва" => "1",
        "Санкт-Петербург" => "2",
        "Екатеринбург" => "3",
        "Новосибирск" => "4",
        "Казань" => "88",
        "Нижний Новгород" => "66",
        "Челябинск" => "104",
        "Самара" => "78",
        "Омск" => "68",
        "Ростов-на-Дону" => "76",
        "Уфа" => "99",
        "Красноярск" => "54",
        "Пермь" => "72",
        "Воронеж" => "26",
        "Волгоград" => "24",
        "Краснодар" => "53",
        "Саратов" => "79",
        "Тюмень" => "95",
        "Ижевск" => "44",
        "Барнаул" => "17",
        "Владивосток" => "22",
        "Ярославль" => "112",
        "Иркутск" => "46",
        "Хабаровск" => "101",
        _ => "1",
    }
}

pub struct HhClient {
    client: Client,
    limiter: RateLimiter,
    base_url: String,
}

impl HhClient {
    pub fn new(limiter: RateLimiter) -> Self {
        let client = Client::builder()
            .user_agent(API_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            limiter,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, query: &str, city: &str, limit: usize) -> Result<Value, FetchOutcome> {
        self.limiter.acquire(Source::Hh).await;

        let per_page = limit.min(20).to_string();
        let response = self
            .client
            .get(format!("{}/vacancies", self.base_url))
            .query(&[
                ("text", query),
                ("area", area_id(city)),
                ("per_page", per_page.as_str()),
                ("page", "0"),
                ("order_by", "relevance"),
            ])
            .send()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchOutcome::RateLimited);
        }
        if status.as_u16() == 403 {
            return Err(FetchOutcome::AuthFailed);
        }
        if !status.is_success() {
            return Err(FetchOutcome::UpstreamError(format!("HTTP {}", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))
    }

    fn parse_item(item: &Value, now: chrono::DateTime<Utc>) -> Option<ExternalPosting> {
        let id = match item.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };
        let title = item.get("name")?.as_str()?.to_string();

        let salary = match item.get("salary") {
            Some(Value::Object(salary)) => format_salary(
                salary.get("from").and_then(Value::as_i64),
                salary.get("to").and_then(Value::as_i64),
                salary.get("currency").and_then(Value::as_str).unwrap_or("RUR"),
            ),
            _ => SALARY_UNKNOWN.to_string(),
        };

        let requirement_text = item
            .pointer("/snippet/requirement")
            .and_then(Value::as_str)
            .unwrap_or("");
        let responsibility_text = item
            .pointer("/snippet/responsibility")
            .and_then(Value::as_str)
            .unwrap_or("");
        let requirements = extract_requirements(requirement_text, GENERAL_KEYWORDS);

        let url = item
            .get("alternate_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://hh.ru/vacancy/{}", id));

        let published = item
            .get("published_at")
            .and_then(Value::as_str)
            .map(|s| bucket_date_str(s, now).render())
            .unwrap_or_else(|| "Недавно".to_string());

        Some(ExternalPosting {
            source: Source::Hh,
            source_id: Some(id),
            title,
            company: item
                .pointer("/employer/name")
                .and_then(Value::as_str)
                .map(str::to_string),
            salary,
            city: item
                .pointer("/area/name")
                .and_then(Value::as_str)
                .unwrap_or("Не указан")
                .to_string(),
            url,
            description: truncate_description(&strip_html(responsibility_text)),
            requirements,
            published,
            is_info: false,
            raw_payload: item.clone(),
        })
    }
}

#[async_trait]
impl SourceClient for HhClient {
    fn source(&self) -> Source {
        Source::Hh
    }

    async fn fetch(&self, query: &str, city: &str, limit: usize) -> SourceFetch {
        info!("Searching HH.ru: '{}' in {}", query, city);

        let mut result = self.request(query, city, limit).await;
        if matches!(result, Err(FetchOutcome::RateLimited)) {
            self.limiter.backoff(Source::Hh).await;
            result = self.request(query, city, limit).await;
        }

        let data = match result {
            Ok(data) => data,
            Err(outcome) => {
                warn!("HH.ru fetch failed: {}", outcome.describe());
                return SourceFetch::failed(outcome);
            }
        };

        let items = match data.get("items").and_then(Value::as_array) {
            Some(items) => items,
            None => {
                warn!("HH.ru response missing 'items'");
                return SourceFetch::failed(FetchOutcome::ParseDrift);
            }
        };

        let now = Utc::now();
        let postings: Vec<ExternalPosting> = items
            .iter()
            .filter_map(|item| Self::parse_item(item, now))
            .take(limit)
            .collect();

        debug!("HH.ru returned {} postings", postings.len());
        SourceFetch::ok(postings)
    }
}
