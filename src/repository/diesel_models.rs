//! Diesel ORM records for the store's tables.
//!
//! Records mirror the raw column layout; conversion into domain models
//! happens in the per-entity repositories.

use diesel::prelude::*;

use crate::schema;

/// Company profile record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::companies)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CompanyRecord {
    pub id: i32,
    pub owner_id: i64,
    pub company_name: String,
    pub industry: String,
    pub city: String,
    pub schedule: String,
    pub salary: String,
    pub communication_style: String,
    pub created_at: String,
}

/// New company profile for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::companies)]
pub struct NewCompany<'a> {
    pub owner_id: i64,
    pub company_name: &'a str,
    pub industry: &'a str,
    pub city: &'a str,
    pub schedule: &'a str,
    pub salary: &'a str,
    pub communication_style: &'a str,
    pub created_at: &'a str,
}

/// Vacancy brief record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::vacancies)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VacancyRecord {
    pub id: i32,
    pub owner_id: i64,
    pub title: String,
    pub query: String,
    pub experience_required: i32,
    pub schedule: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub critical_requirements: String,
    pub status: String,
    pub created_at: String,
}

/// New vacancy brief for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::vacancies)]
pub struct NewVacancy<'a> {
    pub owner_id: i64,
    pub title: &'a str,
    pub query: &'a str,
    pub experience_required: i32,
    pub schedule: &'a str,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub critical_requirements: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
}

/// Candidate record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::candidates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CandidateRecord {
    pub id: i32,
    pub vacancy_id: i32,
    pub name: String,
    pub source: String,
    pub city: String,
    pub skills: String,
    pub ai_score: i32,
    pub ai_verdict: String,
    pub status: String,
    pub is_favorite: i32,
    pub external_posting_id: Option<i32>,
    pub created_at: String,
}

/// New candidate for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::candidates)]
pub struct NewCandidate<'a> {
    pub vacancy_id: i32,
    pub name: &'a str,
    pub source: &'a str,
    pub city: &'a str,
    pub skills: &'a str,
    pub ai_score: i32,
    pub ai_verdict: &'a str,
    pub status: &'a str,
    pub is_favorite: i32,
    pub external_posting_id: Option<i32>,
    pub created_at: &'a str,
}

/// Candidate status ledger record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::candidate_status_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StatusHistoryRecord {
    pub id: i32,
    pub candidate_id: i32,
    pub old_status: String,
    pub new_status: String,
    pub changed_at: String,
}

/// External posting record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::external_postings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PostingRecord {
    pub id: i32,
    pub source: String,
    pub source_id: Option<String>,
    pub title: String,
    pub company: Option<String>,
    pub salary: String,
    pub city: String,
    pub url: String,
    pub description: String,
    pub requirements: String,
    pub published: String,
    pub owner_id: i64,
    pub status: String,
    pub collected_at: String,
    pub ai_analysis: String,
    pub raw_payload: String,
}

/// New external posting for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::external_postings)]
pub struct NewPosting<'a> {
    pub source: &'a str,
    pub source_id: Option<&'a str>,
    pub title: &'a str,
    pub company: Option<&'a str>,
    pub salary: &'a str,
    pub city: &'a str,
    pub url: &'a str,
    pub description: &'a str,
    pub requirements: &'a str,
    pub published: &'a str,
    pub owner_id: i64,
    pub status: &'a str,
    pub collected_at: &'a str,
    pub ai_analysis: &'a str,
    pub raw_payload: &'a str,
}

/// Monitoring settings record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::monitoring_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MonitoringRecord {
    pub id: i32,
    pub owner_id: i64,
    pub city: String,
    pub keywords: String,
    pub interval_minutes: i32,
    pub is_active: i32,
    pub sources: String,
    pub last_check: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
