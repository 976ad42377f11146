//! Compatibility scoring between a posting and a company profile.
//!
//! The default implementation is a deterministic heuristic. The trait exists
//! so an external inference backend (see `llm`) can replace it without the
//! coordinator noticing; whichever implementation runs, scoring is total and
//! never fails the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{CompanyProfile, ExternalPosting};

/// Coarse quality bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Excellent,
    Good,
    Low,
}

impl ScoreTier {
    pub fn from_value(value: u8) -> ScoreTier {
        match value {
            80..=100 => ScoreTier::Excellent,
            60..=79 => ScoreTier::Good,
            _ => ScoreTier::Low,
        }
    }

    /// Traffic-light marker used by presentation layers.
    pub fn color(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "🟢",
            ScoreTier::Good => "🟡",
            ScoreTier::Low => "🔴",
        }
    }
}

/// Result of scoring one posting against one profile. Persisted only as the
/// `ai_analysis` JSON of the stored posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub value: u8,
    pub verdict: String,
    pub recommendation: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub tier: ScoreTier,
}

impl Score {
    /// Build the tier-dependent verdict scaffolding around a clamped value.
    pub fn from_value(value: i32) -> Score {
        let value = value.clamp(0, 100) as u8;
        let tier = ScoreTier::from_value(value);
        let (verdict, recommendation, strengths, weaknesses) = match tier {
            ScoreTier::Excellent => (
                "Отличный кандидат",
                "пригласить",
                vec![
                    "Совпадение локации".to_string(),
                    "Соответствующий опыт".to_string(),
                ],
                vec![],
            ),
            ScoreTier::Good => (
                "Хороший кандидат",
                "рассмотреть",
                vec!["Базовое соответствие".to_string()],
                vec!["Требуется уточнение опыта".to_string()],
            ),
            ScoreTier::Low => (
                "Низкое соответствие",
                "отклонить",
                vec![],
                vec![
                    "Не совпадает город".to_string(),
                    "Мало опыта".to_string(),
                ],
            ),
        };
        Score {
            value,
            verdict: verdict.to_string(),
            recommendation: recommendation.to_string(),
            strengths,
            weaknesses,
            tier,
        }
    }
}

/// Scoring capability. Implementations must be total: any internal failure
/// resolves to some score, never an error.
#[async_trait]
pub trait ScoreEngine: Send + Sync {
    async fn score(&self, posting: &ExternalPosting, profile: &CompanyProfile) -> Score;
}

/// Deterministic reference scorer.
#[derive(Debug, Default, Clone)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core so the heuristic stays usable as a fallback from
    /// other engines without re-entering the async machinery.
    pub fn evaluate(posting: &ExternalPosting, profile: &CompanyProfile) -> Score {
        let mut value: i32 = 50;

        if !posting.city.is_empty()
            && posting.city.to_lowercase().contains(&profile.city.to_lowercase())
        {
            value += 20;
        }

        let combined = format!(
            "{} {} {}",
            posting.title,
            posting.description,
            posting.requirements.join(" ")
        )
        .to_lowercase();
        if combined.contains("опыт") || combined.contains("лет") {
            value += 10;
        }

        let informative_requirements = posting
            .requirements
            .iter()
            .filter(|r| r.as_str() != crate::normalize::REQUIREMENTS_FALLBACK)
            .count() as i32;
        value += (informative_requirements * 5).min(10);

        Score::from_value(value)
    }
}

#[async_trait]
impl ScoreEngine for HeuristicScorer {
    async fn score(&self, posting: &ExternalPosting, profile: &CompanyProfile) -> Score {
        HeuristicScorer::evaluate(posting, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommunicationStyle, Source};

    fn profile(city: &str) -> CompanyProfile {
        CompanyProfile {
            owner_id: 1,
            company_name: "Кофейня Восход".to_string(),
            industry: "Общепит".to_string(),
            city: city.to_string(),
            schedule: "2/2".to_string(),
            salary: "от 45000".to_string(),
            communication_style: CommunicationStyle::Neutral,
        }
    }

    fn posting(city: &str, description: &str, requirements: Vec<String>) -> ExternalPosting {
        ExternalPosting {
            source: Source::Hh,
            source_id: Some("100".to_string()),
            title: "Бариста".to_string(),
            company: Some("Кафе".to_string()),
            salary: "от 40000 ₽".to_string(),
            city: city.to_string(),
            url: "https://hh.ru/vacancy/100".to_string(),
            description: description.to_string(),
            requirements,
            published: "Сегодня".to_string(),
            is_info: false,
            raw_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn score_is_always_in_bounds() {
        let reqs: Vec<String> = (0..10).map(|i| format!("Опыт работы {}", i)).collect();
        let high = HeuristicScorer::evaluate(
            &posting("Москва", "опыт работы от 3 лет", reqs),
            &profile("Москва"),
        );
        assert!(high.value <= 100);

        let low = HeuristicScorer::evaluate(&posting("", "", vec![]), &profile("Москва"));
        assert!(low.value <= 100);
    }

    #[test]
    fn city_match_bonus_is_monotonic() {
        let matching = HeuristicScorer::evaluate(
            &posting("Москва", "описание", vec![]),
            &profile("Москва"),
        );
        let other = HeuristicScorer::evaluate(
            &posting("Казань", "описание", vec![]),
            &profile("Москва"),
        );
        assert!(matching.value >= other.value);
        assert_eq!(matching.value - other.value, 20);
    }

    #[test]
    fn city_match_is_case_insensitive() {
        let lower = HeuristicScorer::evaluate(
            &posting("москва", "описание", vec![]),
            &profile("Москва"),
        );
        let upper = HeuristicScorer::evaluate(
            &posting("Москва", "описание", vec![]),
            &profile("москва"),
        );
        assert_eq!(lower.value, upper.value);
    }

    #[test]
    fn tier_mapping_matches_thresholds() {
        assert_eq!(Score::from_value(85).tier, ScoreTier::Excellent);
        assert_eq!(Score::from_value(80).tier, ScoreTier::Excellent);
        assert_eq!(Score::from_value(79).tier, ScoreTier::Good);
        assert_eq!(Score::from_value(60).tier, ScoreTier::Good);
        assert_eq!(Score::from_value(59).tier, ScoreTier::Low);
    }

    #[test]
    fn tier_verdicts_are_fixed() {
        let excellent = Score::from_value(90);
        assert_eq!(excellent.verdict, "Отличный кандидат");
        assert_eq!(excellent.recommendation, "пригласить");
        assert!(excellent.weaknesses.is_empty());

        let low = Score::from_value(30);
        assert_eq!(low.recommendation, "отклонить");
        assert!(low.strengths.is_empty());
    }

    #[test]
    fn clamping_out_of_range_values() {
        assert_eq!(Score::from_value(-5).value, 0);
        assert_eq!(Score::from_value(140).value, 100);
    }

    #[test]
    fn placeholder_requirements_do_not_add_signal() {
        let with_placeholder = HeuristicScorer::evaluate(
            &posting(
                "Казань",
                "",
                vec![crate::normalize::REQUIREMENTS_FALLBACK.to_string()],
            ),
            &profile("Москва"),
        );
        let without = HeuristicScorer::evaluate(&posting("Казань", "", vec![]), &profile("Москва"));
        assert_eq!(with_placeholder.value, without.value);
    }
}
