//! LLM-backed scoring client.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint (DeepSeek by
//! default). Any failure falls back to the deterministic heuristic so the
//! aggregation pipeline never stalls on the inference collaborator.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{CompanyProfile, ExternalPosting};
use crate::scoring::{HeuristicScorer, Score, ScoreEngine};

/// Default prompt for posting compatibility analysis.
/// Placeholders: {title}, {salary}, {city}, {description}, {profile_city}, {industry}.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"Проанализируй вакансию для компании из отрасли «{industry}» (город {profile_city}):

Должность: {title}
Зарплата: {salary}
Город: {city}
Описание: {description}

Оцени по 100-балльной шкале соответствие вакансии профилю компании.

Ответь ТОЛЬКО в формате JSON:
{"score": число_от_0_до_100, "recommendation": "краткая рекомендация", "key_points": ["плюс1", "плюс2", "плюс3"]}"#;

/// Configuration for the LLM scoring client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether LLM scoring is enabled; disabled means heuristic-only.
    #[serde(default)]
    pub enabled: bool,
    /// Chat-completions endpoint (default: DeepSeek).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; usually supplied via environment.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Custom analysis prompt (supports the documented placeholders).
    #[serde(default)]
    pub analysis_prompt: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.deepseek.com/chat/completions".to_string()
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            analysis_prompt: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Get the analysis prompt, using custom or default.
    pub fn get_analysis_prompt(&self) -> &str {
        self.analysis_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
    }
}

/// Chat-completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Shape the model is asked to answer in.
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    score: i32,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    key_points: Vec<String>,
}

/// Errors that can occur while calling the inference endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("LLM scoring is disabled")]
    Disabled,
}

/// Scoring engine backed by an external inference endpoint.
pub struct LlmScorer {
    config: LlmConfig,
    client: Client,
}

impl LlmScorer {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn analyze(
        &self,
        posting: &ExternalPosting,
        profile: &CompanyProfile,
    ) -> Result<Score, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Api("missing API key".to_string()))?;

        let prompt = self
            .config
            .get_analysis_prompt()
            .replace("{title}", &posting.title)
            .replace("{salary}", &posting.salary)
            .replace("{city}", &posting.city)
            .replace("{description}", &posting.description)
            .replace("{profile_city}", &profile.city)
            .replace("{industry}", &profile.industry);

        debug!("Requesting LLM analysis for: {}", posting.title);
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            stream: false,
        };

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| LlmError::Parse("empty choices".to_string()))?;

        let payload = parse_analysis(content)?;
        let mut score = Score::from_value(payload.score);
        if let Some(recommendation) = payload.recommendation {
            score.recommendation = recommendation;
        }
        if !payload.key_points.is_empty() {
            score.strengths = payload.key_points.into_iter().take(3).collect();
        }
        Ok(score)
    }
}

/// Extract the JSON object from a model reply that may wrap it in prose or
/// code fences.
fn parse_analysis(content: &str) -> Result<AnalysisPayload, LlmError> {
    let start = content
        .find('{')
        .ok_or_else(|| LlmError::Parse("no JSON object in reply".to_string()))?;
    let end = content
        .rfind('}')
        .ok_or_else(|| LlmError::Parse("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(LlmError::Parse("malformed JSON object".to_string()));
    }
    serde_json::from_str(&content[start..=end]).map_err(|e| LlmError::Parse(e.to_string()))
}

#[async_trait]
impl ScoreEngine for LlmScorer {
    async fn score(&self, posting: &ExternalPosting, profile: &CompanyProfile) -> Score {
        match self.analyze(posting, profile).await {
            Ok(score) => score,
            Err(LlmError::Disabled) => HeuristicScorer::evaluate(posting, profile),
            Err(err) => {
                warn!("LLM scoring failed, falling back to heuristic: {}", err);
                HeuristicScorer::evaluate(posting, profile)
            }
        }
    }
}
