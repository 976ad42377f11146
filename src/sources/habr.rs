//! Habr Career vacancies API client (IT-focused board).
//!
//! Uses the OAuth 2.0 client-credentials flow: a Basic-auth token exchange
//! yields a bearer token that is cached with its reported TTL. A 401 on
//! search forces one token refresh and a single retry before the failure
//! surfaces.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{tier_info_posting, RateLimiter, SourceClient, SourceFetch, TokenCache, API_USER_AGENT};
use crate::models::{ExternalPosting, FetchOutcome, Source};
use crate::normalize::{
    bucket_date_str, extract_requirements, format_salary, truncate_description, IT_KEYWORDS,
    SALARY_UNKNOWN,
};

const OAUTH_URL: &str = "https://career.habr.com/oauth/token";
const API_URL: &str = "https://api.career.habr.com";
const ACCESS_INFO_URL: &str = "https://career.habr.com/info/api";

/// Habr Career city ids. Defaults to Moscow.
fn city_id(city: &str) -> u32 {
    match city {
        "Москва" => 1,
        "Санкт-Петербург" => 2,
        "Екатеринбург" => 3,
        "Новосибирск" => 4,
        "Казань" => 5,
        "Краснодар" => 6,
        "Нижний Новгород" => 7,
        "Челябинск" => 8,
        "Самара" => 9,
        "Уфа" => 10,
        "Ростов-на-Дону" => 11,
        "Омск" => 12,
        "Красноярск" => 13,
        "Воронеж" => 14,
        "Пермь" => 15,
        "Волгоград" => 16,
        _ => 1,
    }
}

#[derive(Debug, Clone)]
pub struct HabrCredentials {
    pub client_id: String,
    pub client_secret: String,
}

pub struct HabrClient {
    client: Client,
    limiter: RateLimiter,
    tokens: TokenCache,
    credentials: Option<HabrCredentials>,
    oauth_url: String,
    api_url: String,
}

impl HabrClient {
    pub fn new(limiter: RateLimiter, credentials: Option<HabrCredentials>) -> Self {
        let client = Client::builder()
            .user_agent(API_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            limiter,
            tokens: TokenCache::new(),
            credentials,
            oauth_url: OAUTH_URL.to_string(),
            api_url: API_URL.to_string(),
        }
    }

    /// Point the client at different endpoints (tests).
    pub fn with_urls(mut self, oauth_url: &str, api_url: &str) -> Self {
        self.oauth_url = oauth_url.to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Client-credentials token exchange. Resolves to (token, ttl).
    async fn exchange_token(
        &self,
        credentials: &HabrCredentials,
    ) -> Result<(String, Duration), FetchOutcome> {
        self.limiter.acquire(Source::Habr).await;

        let basic = BASE64.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));
        let response = self
            .client
            .post(&self.oauth_url)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            401 => return Err(FetchOutcome::AuthFailed),
            403 => return Err(FetchOutcome::TierRequired),
            s if !status.is_success() => {
                return Err(FetchOutcome::UpstreamError(format!("token HTTP {}", s)))
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(FetchOutcome::AuthFailed)?
            .to_string();
        let ttl = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(3600);
        debug!("Habr Career token obtained, ttl {}s", ttl);
        Ok((token, Duration::from_secs(ttl)))
    }

    async fn bearer_token(&self, credentials: &HabrCredentials) -> Result<String, FetchOutcome> {
        self.tokens
            .get_or_refresh(|| self.exchange_token(credentials))
            .await
    }

    async fn request(
        &self,
        token: &str,
        query: &str,
        city: &str,
        limit: usize,
    ) -> Result<Value, FetchOutcome> {
        self.limiter.acquire(Source::Habr).await;

        let response = self
            .client
            .get(format!("{}/vacancies", self.api_url))
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("city_id", &city_id(city).to_string()),
                ("per_page", &limit.to_string()),
                ("page", "1"),
                ("sort", "date"),
            ])
            .send()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            401 => return Err(FetchOutcome::AuthFailed),
            403 => return Err(FetchOutcome::TierRequired),
            429 => return Err(FetchOutcome::RateLimited),
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
        let title = item
            .get("title")
            .and_then(Value::as_str)
            .or_else(|| item.get("position").and_then(Value::as_str))?
            .trim();
        if title.is_empty() {
            return None;
        }
        let id = match item.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };

        let salary = match item.get("salary") {
            Some(Value::Object(salary)) => format_salary(
                salary.get("from").and_then(Value::as_i64),
                salary.get("to").and_then(Value::as_i64),
                salary.get("currency").and_then(Value::as_str).unwrap_or("RUB"),
            ),
            _ => SALARY_UNKNOWN.to_string(),
        };

        let url = item
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| item.get("link").and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://career.habr.com/vacancies/{}", id));

        let description_text = item
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| item.get("requirements").and_then(Value::as_str))
            .unwrap_or("");

        // Prefer structured skill tags over free-text extraction.
        let skills: Vec<String> = item
            .get("skills")
            .and_then(Value::as_array)
            .map(|skills| {
                skills
                    .iter()
                    .filter_map(|s| s.get("title").and_then(Value::as_str))
                    .map(str::to_string)
                    .take(3)
                    .collect()
            })
            .unwrap_or_default();
        let requirements = if skills.is_empty() {
            extract_requirements(description_text, IT_KEYWORDS)
        } else {
            skills
        };

        let published = item
            .get("published_at")
            .and_then(Value::as_str)
            .map(|s| bucket_date_str(s, now).render())
            .unwrap_or_else(|| "Недавно".to_string());

        Some(ExternalPosting {
            source: Source::Habr,
            source_id: Some(id),
            title: title.to_string(),
            company: item
                .pointer("/company/title")
                .and_then(Value::as_str)
                .map(str::to_string),
            salary,
            city: item
                .pointer("/city/title")
                .and_then(Value::as_str)
                .unwrap_or(default_city)
                .to_string(),
            url,
            description: truncate_description(description_text),
            requirements,
            published,
            is_info: false,
            raw_payload: item.clone(),
        })
    }
}

#[async_trait]
impl SourceClient for HabrClient {
    fn source(&self) -> Source {
        Source::Habr
    }

    async fn fetch(&self, query: &str, city: &str, limit: usize) -> SourceFetch {
        info!("Searching Habr Career: '{}' in {}", query, city);

        let credentials = match self.credentials.as_ref() {
            Some(credentials) => credentials,
            None => {
                warn!("Habr Career credentials not configured");
                return SourceFetch {
                    postings: vec![tier_info_posting(Source::Habr, query, city, ACCESS_INFO_URL)],
                    outcome: FetchOutcome::AuthFailed,
                };
            }
        };

        let mut attempt = 0;
        let data = loop {
            let token = match self.bearer_token(credentials).await {
                Ok(token) => token,
                Err(outcome @ (FetchOutcome::AuthFailed | FetchOutcome::TierRequired)) => {
                    warn!("Habr Career token exchange failed: {}", outcome.describe());
                    return SourceFetch {
                        postings: vec![tier_info_posting(Source::Habr, query, city, ACCESS_INFO_URL)],
                        outcome,
                    };
                }
                Err(outcome) => return SourceFetch::failed(outcome),
            };

            match self.request(&token, query, city, limit).await {
                Ok(data) => break data,
                Err(FetchOutcome::AuthFailed) if attempt == 0 => {
                    // Stale token: force a refresh and retry once.
                    attempt += 1;
                    self.tokens.invalidate().await;
                }
                Err(FetchOutcome::AuthFailed) => {
                    warn!("Habr Career rejected a freshly exchanged token");
                    return SourceFetch {
                        postings: vec![tier_info_posting(Source::Habr, query, city, ACCESS_INFO_URL)],
                        outcome: FetchOutcome::AuthFailed,
                    };
                }
                Err(FetchOutcome::TierRequired) => {
                    return SourceFetch {
                        postings: vec![tier_info_posting(Source::Habr, query, city, ACCESS_INFO_URL)],
                        outcome: FetchOutcome::TierRequired,
                    };
                }
                Err(FetchOutcome::RateLimited) if attempt == 0 => {
                    attempt += 1;
                    self.limiter.backoff(Source::Habr).await;
                }
                Err(outcome) => {
                    warn!("Habr Career fetch failed: {}", outcome.describe());
                    return SourceFetch::failed(outcome);
                }
            }
        };

        let items = match data.get("vacancies").and_then(Value::as_array) {
            Some(items) => items,
            None => {
                warn!("Habr Career response missing 'vacancies'");
                return SourceFetch::failed(FetchOutcome::ParseDrift);
            }
        };

        let now = Utc::now();
        let postings: Vec<ExternalPosting> = items
            .iter()
            .filter_map(|item| Self::parse_item(item, city, now))
            .take(limit)
            .collect();

        debug!("Habr Career returned {} postings", postings.len());
        SourceFetch::ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_item_prefers_structured_skills() {
        let now = Utc::now();
        let item = json!({
            "id": 9001,
            "title": "Backend-разработчик",
            "company": {"title": "Стартап"},
            "salary": {"from": 200000, "to": null, "currency": "RUB"},
            "city": {"title": "Москва"},
            "skills": [
                {"title": "Python"},
                {"title": "Django"},
                {"title": "PostgreSQL"},
                {"title": "Docker"}
            ],
            "description": "Разработка сервисов.",
            "published_at": now.to_rfc3339()
        });

        let posting = HabrClient::parse_item(&item, "Казань", now).unwrap();
        assert_eq!(posting.salary, "от 200000 ₽");
        assert_eq!(
            posting.requirements,
            vec!["Python", "Django", "PostgreSQL"]
        );
        assert_eq!(posting.url, "https://career.habr.com/vacancies/9001");
    }

    #[test]
    fn parse_item_extracts_it_keywords_without_skills() {
        let now = Utc::now();
        let item = json!({
            "id": "42",
            "position": "Разработчик",
            "description": "Необходимо знание Python и опыт работы с Docker в проде."
        });

        let posting = HabrClient::parse_item(&item, "Москва", now).unwrap();
        assert!(posting.requirements[0].to_lowercase().contains("python"));
        assert_eq!(posting.city, "Москва");
    }

    #[tokio::test]
    async fn missing_credentials_yield_info_posting() {
        let client = HabrClient::new(RateLimiter::new(), None);
        let fetch = client.fetch("python", "Москва", 5).await;
        assert_eq!(fetch.outcome, FetchOutcome::AuthFailed);
        assert_eq!(fetch.postings.len(), 1);
        assert!(fetch.postings[0].is_info);
        assert_eq!(fetch.postings[0].source_tag(), "habr_info");
    }

    #[test]
    fn city_ids_default_to_moscow() {
        assert_eq!(city_id("Казань"), 5);
        assert_eq!(city_id("Урюпинск"), 1);
    }
}
