//! Avito marketplace scraper.
//!
//! No credentials: fetches the public search page for a region and extracts
//! listing cards from the DOM. Only links that point at one specific ad (a
//! trailing numeric identifier in the path) are accepted; category and search
//! links are rejected, and a page with zero acceptable links yields an empty
//! result rather than a fabricated one. Identifying headers rotate per
//! request to reduce block risk.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::{rotating_user_agent, RateLimiter, SourceClient, SourceFetch};
use crate::models::{ExternalPosting, FetchOutcome, Source};
use crate::normalize::{extract_requirements, strip_html, truncate_description, GENERAL_KEYWORDS};

const BASE_URL: &str = "https://www.avito.ru";

/// Avito region slugs. Unknown cities search nationwide.
fn region_slug(city: &str) -> &'static str {
    match city {
        "Москва" => "moskva",
        "Санкт-Петербург" => "sankt-peterburg",
        "Казань" => "kazan",
        "Новосибирск" => "novosibirsk",
        "Екатеринбург" => "ekaterinburg",
        "Нижний Новгород" => "nizhniy_novgorod",
        "Краснодар" => "krasnodar",
        "Самара" => "samara",
        _ => "rossiya",
    }
}

fn trailing_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A link to one specific ad carries a numeric id at the end of its path,
    // either as the whole last segment or after an underscore.
    RE.get_or_init(|| Regex::new(r"(?:/|_)(\d+)/?$").expect("valid id regex"))
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

pub struct AvitoScraper {
    client: Client,
    limiter: RateLimiter,
    base_url: String,
}

impl AvitoScraper {
    pub fn new(limiter: RateLimiter) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            limiter,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the scraper at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, query: &str, city: &str) -> String {
        format!(
            "{}/{}/vakansii?q={}",
            self.base_url,
            region_slug(city),
            urlencoding::encode(query)
        )
    }

    async fn request(&self, url: &str) -> Result<String, FetchOutcome> {
        self.limiter.acquire(Source::Avito).await;

        let response = self
            .client
            .get(url)
            .header("User-Agent", rotating_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7")
            .header("Referer", format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            429 | 503 => return Err(FetchOutcome::RateLimited),
            s if !status.is_success() => {
                return Err(FetchOutcome::UpstreamError(format!("HTTP {}", s)))
            }
            _ => {}
        }

        response
            .text()
            .await
            .map_err(|e| FetchOutcome::UpstreamError(e.to_string()))
    }

    /// Extract a posting-specific link and its numeric id from a card.
    /// Returns None when the card only links to category or search pages.
    fn specific_ad_link(card: ElementRef<'_>, base_url: &str) -> Option<(String, String)> {
        let candidates = [
            selector(r#"a[data-marker="item-title"]"#),
            selector(r#"a[href*="/vakansii/"]"#),
            selector("a[href]"),
        ];
        for sel in &candidates {
            for link in card.select(sel) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let Some(captures) = trailing_id_regex().captures(href.trim_end_matches('/')) else {
                    continue;
                };
                let id = captures.get(1).map(|m| m.as_str().to_string())?;
                let url = if href.starts_with("//") {
                    format!("https:{}", href)
                } else if href.starts_with('/') {
                    format!("{}{}", base_url, href)
                } else {
                    href.to_string()
                };
                return Some((url, id));
            }
        }
        None
    }

    fn first_text(card: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
        for css in selectors {
            let sel = selector(css);
            if let Some(node) = card.select(&sel).next() {
                let text = strip_html(&node.text().collect::<String>());
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }

    /// Parse the search results page. Fully synchronous: the DOM never lives
    /// across an await point. Returns None when the expected card structure
    /// is absent from the page entirely.
    fn extract_postings(
        html: &str,
        base_url: &str,
        query: &str,
        default_city: &str,
        limit: usize,
    ) -> Option<Vec<ExternalPosting>> {
        let document = Html::parse_document(html);

        let primary = selector(r#"[data-marker="item"]"#);
        let fallback = selector(".iva-item-content-rejJg");
        let mut cards: Vec<ElementRef<'_>> = document.select(&primary).collect();
        if cards.is_empty() {
            cards = document.select(&fallback).collect();
        }
        if cards.is_empty() {
            return None;
        }

        let mut postings = Vec::new();
        for card in cards.into_iter().take(limit) {
            let Some((url, id)) = Self::specific_ad_link(card, base_url) else {
                continue;
            };
            let Some(title) = Self::first_text(
                card,
                &[
                    r#"[itemprop="name"]"#,
                    "h3",
                    r#"[data-marker="item-title"]"#,
                    ".title-root-zZCwT",
                ],
            ) else {
                continue;
            };

            let salary = Self::first_text(
                card,
                &[r#"[data-marker="item-price"]"#, ".price-price-JP7qe"],
            )
            .unwrap_or_else(|| "Договорная".to_string());
            let description = Self::first_text(
                card,
                &[
                    r#"[data-marker="item-specific-params"]"#,
                    ".iva-item-description-StepN",
                ],
            )
            .unwrap_or_default();
            let city = Self::first_text(
                card,
                &[r#"[data-marker="item-address"]"#, ".geo-georeferences-SEtee"],
            )
            .unwrap_or_else(|| default_city.to_string());
            let published = Self::first_text(card, &[r#"[data-marker="item-date"]"#])
                .unwrap_or_else(|| "Недавно".to_string());

            debug!("Avito ad accepted: {} ({})", title, url);
            postings.push(ExternalPosting {
                source: Source::Avito,
                source_id: Some(format!("av_{}", id)),
                title: {
                    let mut t = title;
                    t.truncate(t.chars().take(200).map(char::len_utf8).sum());
                    t
                },
                company: None,
                salary,
                city,
                url,
                description: truncate_description(&description),
                requirements: extract_requirements(&description, GENERAL_KEYWORDS),
                published,
                is_info: false,
                raw_payload: serde_json::json!({ "query": query }),
            });
        }

        Some(postings)
    }
}

#[async_trait]
impl SourceClient for AvitoScraper {
    fn source(&self) -> Source {
        Source::Avito
    }

    async fn fetch(&self, query: &str, city: &str, limit: usize) -> SourceFetch {
        let url = self.search_url(query, city);
        info!("Scraping Avito: '{}' in {} ({})", query, city, url);

        let mut result = self.request(&url).await;
        if matches!(result, Err(FetchOutcome::RateLimited)) {
            self.limiter.backoff(Source::Avito).await;
            result = self.request(&url).await;
        }

        let html = match result {
            Ok(html) => html,
            Err(outcome) => {
                warn!("Avito fetch failed: {}", outcome.describe());
                return SourceFetch::failed(outcome);
            }
        };

        match Self::extract_postings(&html, &self.base_url, query, city, limit) {
            Some(postings) => {
                debug!("Avito returned {} postings with specific links", postings.len());
                SourceFetch::ok(postings)
            }
            None => {
                // Card markup absent: markup drift or a block page.
                warn!("Avito card structure not found, treating as parse drift");
                SourceFetch::failed(FetchOutcome::ParseDrift)
            }
        }
    }
}
