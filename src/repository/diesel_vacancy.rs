//! Vacancy brief repository.
//!
//! Briefs are never physically deleted; closing one is a soft status change.

use diesel::prelude::*;

use super::diesel_models::{NewVacancy, VacancyRecord};
use super::diesel_pool::{run_blocking, SqlitePool};
use super::{parse_datetime, parse_string_list, StoreError};
use crate::models::{Vacancy, VacancyBrief, VacancyStatus};
use crate::schema::vacancies;

impl From<VacancyRecord> for Vacancy {
    fn from(record: VacancyRecord) -> Self {
        Vacancy {
            id: record.id,
            owner_id: record.owner_id,
            brief: VacancyBrief {
                title: record.title,
                query: record.query,
                experience_required: record.experience_required != 0,
                schedule: record.schedule,
                salary_min: record.salary_min,
                salary_max: record.salary_max,
                critical_requirements: parse_string_list(&record.critical_requirements),
            },
            status: VacancyStatus::from_str(&record.status),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

#[derive(Clone)]
pub struct VacancyRepository {
    pool: SqlitePool,
}

impl VacancyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new brief and return its id.
    pub async fn create(&self, owner_id: i64, brief: &VacancyBrief) -> Result<i32, StoreError> {
        let critical = serde_json::to_string(&brief.critical_requirements)?;
        let brief = brief.clone();
        let pool = self.pool.clone();

        let id = run_blocking(pool, move |conn| {
            let now = chrono::Utc::now().to_rfc3339();
            diesel::insert_into(vacancies::table)
                .values(NewVacancy {
                    owner_id,
                    title: &brief.title,
                    query: &brief.query,
                    experience_required: brief.experience_required as i32,
                    schedule: &brief.schedule,
                    salary_min: brief.salary_min,
                    salary_max: brief.salary_max,
                    critical_requirements: &critical,
                    status: VacancyStatus::Active.as_str(),
                    created_at: &now,
                })
                .execute(conn)?;
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
                "last_insert_rowid()",
            ))
            .get_result(conn)
        })
        .await?;
        Ok(id)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Vacancy>, StoreError> {
        let pool = self.pool.clone();
        let record = run_blocking(pool, move |conn| {
            vacancies::table.find(id).first::<VacancyRecord>(conn).optional()
        })
        .await?;
        Ok(record.map(Vacancy::from))
    }

    /// All briefs of an owner, newest first.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<Vacancy>, StoreError> {
        let pool = self.pool.clone();
        let records = run_blocking(pool, move |conn| {
            vacancies::table
                .filter(vacancies::owner_id.eq(owner_id))
                .order(vacancies::created_at.desc())
                .load::<VacancyRecord>(conn)
        })
        .await?;
        Ok(records.into_iter().map(Vacancy::from).collect())
    }

    /// Soft status change; the row itself is never removed.
    pub async fn update_status(&self, id: i32, status: VacancyStatus) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        let affected = run_blocking(pool, move |conn| {
            diesel::update(vacancies::table.find(id))
                .set(vacancies::status.eq(status.as_str()))
                .execute(conn)
        })
        .await?;
        Ok(affected > 0)
    }
}
