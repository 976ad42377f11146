//! Durable persistence for companies, vacancies, candidates, and postings.
//!
//! Each entity gets its own Diesel repository over a shared r2d2 pool.
//! Natural-key upserts are idempotent: re-ingesting an existing key is a
//! reported no-op, never an error.

pub mod diesel_candidate;
pub mod diesel_company;
pub mod diesel_models;
pub mod diesel_monitoring;
pub mod diesel_pool;
pub mod diesel_posting;
pub mod diesel_vacancy;

pub use diesel_candidate::CandidateRepository;
pub use diesel_company::CompanyRepository;
pub use diesel_monitoring::MonitoringRepository;
pub use diesel_pool::{create_pool, create_pool_from_url, run_blocking, SqlitePool};
pub use diesel_posting::{PostingRepository, UpsertOutcome};
pub use diesel_vacancy::VacancyRepository;

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use diesel_pool::DieselError;

/// Errors surfaced by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DieselError),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Parse an RFC 3339 timestamp column, falling back to now on corruption.
pub(crate) fn parse_datetime(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_datetime_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().map(parse_datetime)
}

/// Decode a JSON list column, tolerating legacy or corrupt values.
pub(crate) fn parse_string_list(value: &str) -> Vec<String> {
    serde_json::from_str(value).unwrap_or_default()
}

/// Create all tables and uniqueness constraints if they do not exist yet.
/// Safe to call on every startup.
pub async fn init_schema(pool: SqlitePool) -> Result<(), StoreError> {
    run_blocking(pool, |conn| {
        diesel_pool::init_connection_pragmas(conn)?;
        diesel::sql_query(
            r#"CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id BIGINT NOT NULL UNIQUE,
                company_name TEXT NOT NULL,
                industry TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                schedule TEXT NOT NULL DEFAULT '',
                salary TEXT NOT NULL DEFAULT '',
                communication_style TEXT NOT NULL DEFAULT 'neutral',
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(conn)?;
        diesel::sql_query(
            r#"CREATE TABLE IF NOT EXISTS vacancies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id BIGINT NOT NULL,
                title TEXT NOT NULL,
                query TEXT NOT NULL,
                experience_required INTEGER NOT NULL DEFAULT 1,
                schedule TEXT NOT NULL DEFAULT '',
                salary_min BIGINT,
                salary_max BIGINT,
                critical_requirements TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(conn)?;
        diesel::sql_query(
            r#"CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vacancy_id INTEGER NOT NULL REFERENCES vacancies(id),
                name TEXT NOT NULL,
                source TEXT NOT NULL,
                city TEXT NOT NULL DEFAULT '',
                skills TEXT NOT NULL DEFAULT '[]',
                ai_score INTEGER NOT NULL DEFAULT 0,
                ai_verdict TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'new',
                is_favorite INTEGER NOT NULL DEFAULT 0,
                external_posting_id INTEGER,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(conn)?;
        diesel::sql_query(
            r#"CREATE TABLE IF NOT EXISTS candidate_status_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                candidate_id INTEGER NOT NULL REFERENCES candidates(id),
                old_status TEXT NOT NULL,
                new_status TEXT NOT NULL,
                changed_at TEXT NOT NULL
            )"#,
        )
        .execute(conn)?;
        diesel::sql_query(
            r#"CREATE TABLE IF NOT EXISTS external_postings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                source_id TEXT,
                title TEXT NOT NULL,
                company TEXT,
                salary TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                requirements TEXT NOT NULL DEFAULT '[]',
                published TEXT NOT NULL DEFAULT '',
                owner_id BIGINT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new',
                collected_at TEXT NOT NULL,
                ai_analysis TEXT NOT NULL DEFAULT '{}',
                raw_payload TEXT NOT NULL DEFAULT 'null'
            )"#,
        )
        .execute(conn)?;
        diesel::sql_query(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_postings_natural_key
               ON external_postings(source, source_id, owner_id)
               WHERE source_id IS NOT NULL"#,
        )
        .execute(conn)?;
        diesel::sql_query(
            r#"CREATE TABLE IF NOT EXISTS monitoring_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id BIGINT NOT NULL UNIQUE,
                city TEXT NOT NULL DEFAULT '',
                keywords TEXT NOT NULL DEFAULT '[]',
                interval_minutes INTEGER NOT NULL DEFAULT 60,
                is_active INTEGER NOT NULL DEFAULT 0,
                sources TEXT NOT NULL DEFAULT '[]',
                last_check TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
        )
        .execute(conn)?;
        Ok(())
    })
    .await
    .map_err(StoreError::from)
}
