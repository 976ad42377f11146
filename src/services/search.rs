//! Search service: the contract exposed to the dialogue layer.
//!
//! The dialogue layer collects the query, city, and brief fields and renders
//! the ranked result; scoring and dedup live here and are not re-implemented
//! above this boundary.

use std::sync::Arc;

use tracing::info;

use crate::aggregator::{AggregationCoordinator, RankedResult};
use crate::models::{Source, VacancyBrief};
use crate::repository::{
    diesel_candidate::NewCandidateInput, CandidateRepository, CompanyRepository, StoreError,
    VacancyRepository,
};

/// Errors surfaced to the caller. Per-source failures are never errors; only
/// conditions that make the whole call meaningless are.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no company profile exists for owner {0}; run onboarding first")]
    ProfileMissing(i64),
    #[error("vacancy brief has an empty search query")]
    InvalidBrief,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Default per-source posting limit for interactive searches.
pub const DEFAULT_PER_SOURCE_LIMIT: usize = 4;

pub struct SearchService {
    coordinator: Arc<AggregationCoordinator>,
    companies: CompanyRepository,
    vacancies: VacancyRepository,
    candidates: CandidateRepository,
    per_source_limit: usize,
}

impl SearchService {
    pub fn new(
        coordinator: Arc<AggregationCoordinator>,
        companies: CompanyRepository,
        vacancies: VacancyRepository,
        candidates: CandidateRepository,
    ) -> Self {
        Self {
            coordinator,
            companies,
            vacancies,
            candidates,
            per_source_limit: DEFAULT_PER_SOURCE_LIMIT,
        }
    }

    /// Override the per-source result limit (from configuration).
    pub fn with_per_source_limit(mut self, limit: usize) -> Self {
        self.per_source_limit = limit.max(1);
        self
    }

    /// Search all (or a subset of) boards for an owner.
    ///
    /// The owner's profile city is used unless `city` overrides it. An absent
    /// profile is the one hard failure; everything else resolves into the
    /// `RankedResult`, including the explicit no-results state.
    pub async fn search_vacancies(
        &self,
        owner_id: i64,
        query: &str,
        city: Option<&str>,
        sources: Option<&[Source]>,
    ) -> Result<RankedResult, ServiceError> {
        let profile = self
            .companies
            .get(owner_id)
            .await?
            .ok_or(ServiceError::ProfileMissing(owner_id))?;

        let city = city.unwrap_or(&profile.city).to_string();
        Ok(self
            .coordinator
            .aggregate(query, &city, &profile, self.per_source_limit, sources)
            .await)
    }

    /// Store a vacancy brief, find matching postings, and create candidate
    /// records for every scored posting.
    pub async fn create_vacancy_and_find_candidates(
        &self,
        owner_id: i64,
        brief: &VacancyBrief,
    ) -> Result<(i32, RankedResult), ServiceError> {
        if brief.query.trim().is_empty() {
            return Err(ServiceError::InvalidBrief);
        }
        let profile = self
            .companies
            .get(owner_id)
            .await?
            .ok_or(ServiceError::ProfileMissing(owner_id))?;

        let vacancy_id = self.vacancies.create(owner_id, brief).await?;
        info!("Created vacancy {} for owner {}", vacancy_id, owner_id);

        let result = self
            .coordinator
            .aggregate(&brief.query, &profile.city, &profile, self.per_source_limit, None)
            .await;

        for scored in &result.postings {
            self.candidates
                .add(
                    vacancy_id,
                    NewCandidateInput {
                        name: scored.posting.title.clone(),
                        source: scored.posting.source_tag(),
                        city: scored.posting.city.clone(),
                        skills: scored.posting.requirements.clone(),
                        ai_score: scored.score.value as i32,
                        ai_verdict: scored.score.verdict.clone(),
                        external_posting_id: scored.stored_id,
                    },
                )
                .await?;
        }

        Ok((vacancy_id, result))
    }
}
