//! Candidate repository with an append-only status ledger.
//!
//! Every real status transition (old != new) appends one immutable history
//! row. Favorite toggling is not a workflow transition and logs nothing.

use diesel::prelude::*;
use tracing::debug;

use super::diesel_models::{CandidateRecord, NewCandidate, StatusHistoryRecord};
use super::diesel_pool::{run_blocking, SqlitePool};
use super::{parse_datetime, parse_string_list, StoreError};
use crate::models::{Candidate, CandidateStatus, StatusChange};
use crate::schema::{candidate_status_history, candidates};

impl From<CandidateRecord> for Candidate {
    fn from(record: CandidateRecord) -> Self {
        Candidate {
            id: record.id,
            vacancy_id: record.vacancy_id,
            name: record.name,
            source: record.source,
            city: record.city,
            skills: parse_string_list(&record.skills),
            ai_score: record.ai_score,
            ai_verdict: record.ai_verdict,
            status: CandidateStatus::from_str(&record.status),
            is_favorite: record.is_favorite != 0,
            external_posting_id: record.external_posting_id,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<StatusHistoryRecord> for StatusChange {
    fn from(record: StatusHistoryRecord) -> Self {
        StatusChange {
            candidate_id: record.candidate_id,
            old_status: record.old_status,
            new_status: record.new_status,
            changed_at: parse_datetime(&record.changed_at),
        }
    }
}

/// Input for creating a candidate from a scored posting.
#[derive(Debug, Clone)]
pub struct NewCandidateInput {
    pub name: String,
    pub source: String,
    pub city: String,
    pub skills: Vec<String>,
    pub ai_score: i32,
    pub ai_verdict: String,
    pub external_posting_id: Option<i32>,
}

#[derive(Clone)]
pub struct CandidateRepository {
    pool: SqlitePool,
}

impl CandidateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a candidate to a vacancy. Skills are capped at three entries.
    pub async fn add(&self, vacancy_id: i32, input: NewCandidateInput) -> Result<i32, StoreError> {
        let skills: Vec<String> = input.skills.into_iter().take(3).collect();
        let skills_json = serde_json::to_string(&skills)?;
        let pool = self.pool.clone();

        let id = run_blocking(pool, move |conn| {
            let now = chrono::Utc::now().to_rfc3339();
            diesel::insert_into(candidates::table)
                .values(NewCandidate {
                    vacancy_id,
                    name: &input.name,
                    source: &input.source,
                    city: &input.city,
                    skills: &skills_json,
                    ai_score: input.ai_score,
                    ai_verdict: &input.ai_verdict,
                    status: CandidateStatus::New.as_str(),
                    is_favorite: 0,
                    external_posting_id: input.external_posting_id,
                    created_at: &now,
                })
                .execute(conn)?;
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
                "last_insert_rowid()",
            ))
            .get_result(conn)
        })
        .await?;
        debug!("Candidate {} added to vacancy {}", id, vacancy_id);
        Ok(id)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Candidate>, StoreError> {
        let pool = self.pool.clone();
        let record = run_blocking(pool, move |conn| {
            candidates::table.find(id).first::<CandidateRecord>(conn).optional()
        })
        .await?;
        Ok(record.map(Candidate::from))
    }

    /// Candidates for a vacancy, best score first.
    pub async fn list_for_vacancy(&self, vacancy_id: i32) -> Result<Vec<Candidate>, StoreError> {
        let pool = self.pool.clone();
        let records = run_blocking(pool, move |conn| {
            candidates::table
                .filter(candidates::vacancy_id.eq(vacancy_id))
                .order(candidates::ai_score.desc())
                .load::<CandidateRecord>(conn)
        })
        .await?;
        Ok(records.into_iter().map(Candidate::from).collect())
    }

    /// Transition a candidate's workflow status.
    ///
    /// Appends a history row inside the same transaction, but only when the
    /// status actually changes.
    pub async fn update_status(
        &self,
        candidate_id: i32,
        status: CandidateStatus,
    ) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        let changed = run_blocking(pool, move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let old_status: Option<String> = candidates::table
                    .find(candidate_id)
                    .select(candidates::status)
                    .first(conn)
                    .optional()?;
                let Some(old_status) = old_status else {
                    return Ok(false);
                };

                diesel::update(candidates::table.find(candidate_id))
                    .set(candidates::status.eq(status.as_str()))
                    .execute(conn)?;

                if old_status != status.as_str() {
                    let now = chrono::Utc::now().to_rfc3339();
                    diesel::insert_into(candidate_status_history::table)
                        .values((
                            candidate_status_history::candidate_id.eq(candidate_id),
                            candidate_status_history::old_status.eq(&old_status),
                            candidate_status_history::new_status.eq(status.as_str()),
                            candidate_status_history::changed_at.eq(&now),
                        ))
                        .execute(conn)?;
                }
                Ok(true)
            })
        })
        .await?;
        Ok(changed)
    }

    /// Flip the favorite flag. Intentionally not part of the status ledger.
    pub async fn toggle_favorite(
        &self,
        candidate_id: i32,
        is_favorite: bool,
    ) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        let affected = run_blocking(pool, move |conn| {
            diesel::update(candidates::table.find(candidate_id))
                .set(candidates::is_favorite.eq(is_favorite as i32))
                .execute(conn)
        })
        .await?;
        Ok(affected > 0)
    }

    /// Status ledger for a candidate, oldest first.
    pub async fn status_history(&self, candidate_id: i32) -> Result<Vec<StatusChange>, StoreError> {
        let pool = self.pool.clone();
        let records = run_blocking(pool, move |conn| {
            candidate_status_history::table
                .filter(candidate_status_history::candidate_id.eq(candidate_id))
                .order(candidate_status_history::id.asc())
                .load::<StatusHistoryRecord>(conn)
        })
        .await?;
        Ok(records.into_iter().map(StatusChange::from).collect())
    }
}
