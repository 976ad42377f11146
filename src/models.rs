//! Domain models for the sourcing pipeline.
//!
//! These are the typed records passed between the source clients, the
//! aggregation coordinator, and the repositories. Validation happens at the
//! normalization boundary; the repositories only ever see these shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream job-board integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Hh,
    SuperJob,
    Habr,
    Avito,
}

impl Source {
    /// Stable identifier used in the database and dedup fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Hh => "hh",
            Source::SuperJob => "superjob",
            Source::Habr => "habr",
            Source::Avito => "avito",
        }
    }

    /// Label for informational (non-real) records from this source.
    pub fn info_label(&self) -> String {
        format!("{}_info", self.as_str())
    }

    /// Human-readable board name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Hh => "HH.ru",
            Source::SuperJob => "SuperJob",
            Source::Habr => "Habr Career",
            Source::Avito => "Avito",
        }
    }

    /// Deterministic tie-break order for ranking (lower wins).
    pub fn priority(&self) -> u8 {
        match self {
            Source::Hh => 0,
            Source::SuperJob => 1,
            Source::Habr => 2,
            Source::Avito => 3,
        }
    }

    pub fn from_str(s: &str) -> Option<Source> {
        match s {
            "hh" => Some(Source::Hh),
            "superjob" => Some(Source::SuperJob),
            "habr" => Some(Source::Habr),
            "avito" => Some(Source::Avito),
            _ => None,
        }
    }

    pub fn all() -> [Source; 4] {
        [Source::Hh, Source::SuperJob, Source::Habr, Source::Avito]
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single source fetch resolved. Failures are values, not errors;
/// a fetch never propagates an `Err` to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok,
    AuthFailed,
    RateLimited,
    TierRequired,
    UpstreamError(String),
    ParseDrift,
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchOutcome::Ok)
    }

    /// Short human description for per-source reports.
    pub fn describe(&self) -> String {
        match self {
            FetchOutcome::Ok => "ok".to_string(),
            FetchOutcome::AuthFailed => "authorization failed".to_string(),
            FetchOutcome::RateLimited => "rate limited".to_string(),
            FetchOutcome::TierRequired => "paid tier required".to_string(),
            FetchOutcome::UpstreamError(msg) => format!("upstream error: {}", msg),
            FetchOutcome::ParseDrift => "expected response shape not found".to_string(),
        }
    }
}

/// Canonical normalized form of one externally-sourced job advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalPosting {
    pub source: Source,
    /// Stable id within the source; absent means the record is non-cacheable
    /// and is deduplicated only by content fingerprint.
    pub source_id: Option<String>,
    pub title: String,
    pub company: Option<String>,
    /// Pre-rendered human salary string ("50000 - 70000 ₽", "от 40000 ₽", ...).
    pub salary: String,
    pub city: String,
    /// Must resolve to one specific posting, never a search or category page.
    pub url: String,
    pub description: String,
    pub requirements: Vec<String>,
    /// Rendered publication bucket ("Сегодня", "Вчера", "3 дн. назад", ...).
    pub published: String,
    /// Informational record explaining a source-level condition (e.g. paid
    /// tier lockout). Excluded from scoring, dedup, and persisted counts.
    #[serde(default)]
    pub is_info: bool,
    /// Opaque upstream payload kept for audit and debugging.
    #[serde(default)]
    pub raw_payload: serde_json::Value,
}

impl ExternalPosting {
    /// Source label as stored: informational records are tagged distinctly.
    pub fn source_tag(&self) -> String {
        if self.is_info {
            self.source.info_label()
        } else {
            self.source.as_str().to_string()
        }
    }
}

/// Company profile collected at onboarding. One per owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub owner_id: i64,
    pub company_name: String,
    pub industry: String,
    pub city: String,
    pub schedule: String,
    pub salary: String,
    pub communication_style: CommunicationStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Strict,
    Friendly,
    Neutral,
}

impl CommunicationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStyle::Strict => "strict",
            CommunicationStyle::Friendly => "friendly",
            CommunicationStyle::Neutral => "neutral",
        }
    }

    pub fn from_str(s: &str) -> CommunicationStyle {
        match s {
            "strict" => CommunicationStyle::Strict,
            "friendly" => CommunicationStyle::Friendly,
            _ => CommunicationStyle::Neutral,
        }
    }
}

/// A vacancy brief created by the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyBrief {
    pub title: String,
    pub query: String,
    pub experience_required: bool,
    pub schedule: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub critical_requirements: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VacancyStatus {
    Active,
    Closed,
}

impl VacancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VacancyStatus::Active => "active",
            VacancyStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> VacancyStatus {
        match s {
            "closed" => VacancyStatus::Closed,
            _ => VacancyStatus::Active,
        }
    }
}

/// A stored vacancy brief with its identity.
#[derive(Debug, Clone)]
pub struct Vacancy {
    pub id: i32,
    pub owner_id: i64,
    pub brief: VacancyBrief,
    pub status: VacancyStatus,
    pub created_at: DateTime<Utc>,
}

/// Workflow status of a sourced candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    New,
    Contacted,
    InProgress,
    Rejected,
    Hired,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::New => "new",
            CandidateStatus::Contacted => "contacted",
            CandidateStatus::InProgress => "in_progress",
            CandidateStatus::Rejected => "rejected",
            CandidateStatus::Hired => "hired",
        }
    }

    pub fn from_str(s: &str) -> CandidateStatus {
        match s {
            "contacted" => CandidateStatus::Contacted,
            "in_progress" => CandidateStatus::InProgress,
            "rejected" => CandidateStatus::Rejected,
            "hired" => CandidateStatus::Hired,
            _ => CandidateStatus::New,
        }
    }
}

/// Owner's CRM record derived from a scored posting.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: i32,
    pub vacancy_id: i32,
    pub name: String,
    pub source: String,
    pub city: String,
    pub skills: Vec<String>,
    pub ai_score: i32,
    pub ai_verdict: String,
    pub status: CandidateStatus,
    pub is_favorite: bool,
    pub external_posting_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// One entry of a candidate's status ledger.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub candidate_id: i32,
    pub old_status: String,
    pub new_status: String,
    pub changed_at: DateTime<Utc>,
}

/// Per-owner background polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub owner_id: i64,
    pub city: String,
    pub keywords: Vec<String>,
    pub interval_minutes: u32,
    pub is_active: bool,
    pub sources: Vec<Source>,
    pub last_check: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trip() {
        for source in Source::all() {
            assert_eq!(Source::from_str(source.as_str()), Some(source));
        }
        assert_eq!(Source::from_str("telegram"), None);
    }

    #[test]
    fn info_label_is_tagged_distinctly() {
        assert_eq!(Source::Avito.info_label(), "avito_info");
        let posting = ExternalPosting {
            source: Source::Avito,
            source_id: None,
            title: "t".to_string(),
            company: None,
            salary: "Не указана".to_string(),
            city: "Москва".to_string(),
            url: "https://www.avito.ru/business/tools/api".to_string(),
            description: String::new(),
            requirements: vec![],
            published: "—".to_string(),
            is_info: true,
            raw_payload: serde_json::Value::Null,
        };
        assert_eq!(posting.source_tag(), "avito_info");
    }

    #[test]
    fn source_priority_is_strictly_ordered() {
        let mut priorities: Vec<u8> = Source::all().iter().map(|s| s.priority()).collect();
        priorities.sort_unstable();
        priorities.dedup();
        assert_eq!(priorities.len(), 4);
    }
}
