//! Company profile repository.
//!
//! Profiles are keyed by owner: re-running onboarding updates the existing
//! row in place. The upsert verifies its own write by re-reading after commit
//! and reports expected failure modes (empty name, integrity violation) as
//! `false` instead of an error.

use chrono::Utc;
use diesel::prelude::*;
use tracing::{info, warn};

use super::diesel_models::{CompanyRecord, NewCompany};
use super::diesel_pool::{run_blocking, SqlitePool};
use super::StoreError;
use crate::models::{CommunicationStyle, CompanyProfile};
use crate::schema::companies;

impl From<CompanyRecord> for CompanyProfile {
    fn from(record: CompanyRecord) -> Self {
        CompanyProfile {
            owner_id: record.owner_id,
            company_name: record.company_name,
            industry: record.industry,
            city: record.city,
            schedule: record.schedule,
            salary: record.salary,
            communication_style: CommunicationStyle::from_str(&record.communication_style),
        }
    }
}

#[derive(Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the profile for an owner.
    pub async fn get(&self, owner_id: i64) -> Result<Option<CompanyProfile>, StoreError> {
        let pool = self.pool.clone();
        let record = run_blocking(pool, move |conn| {
            companies::table
                .filter(companies::owner_id.eq(owner_id))
                .first::<CompanyRecord>(conn)
                .optional()
        })
        .await?;
        Ok(record.map(CompanyProfile::from))
    }

    /// Insert or update the profile for `profile.owner_id`.
    ///
    /// Returns `true` only when the write landed and was confirmed by a
    /// re-read. An empty company name is rejected before any write.
    pub async fn upsert(&self, profile: &CompanyProfile) -> Result<bool, StoreError> {
        let name = profile.company_name.trim();
        if name.is_empty() {
            warn!("Rejecting company profile with empty name (owner {})", profile.owner_id);
            return Ok(false);
        }

        let owner_id = profile.owner_id;
        let profile = CompanyProfile {
            company_name: name.to_string(),
            ..profile.clone()
        };
        let pool = self.pool.clone();

        let verified = run_blocking(pool, move |conn| {
            let owner_id = profile.owner_id;
            let now = Utc::now().to_rfc3339();
            let style = profile.communication_style.as_str();

            let write_result = conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let existing: Option<i32> = companies::table
                    .filter(companies::owner_id.eq(owner_id))
                    .select(companies::id)
                    .first(conn)
                    .optional()?;

                let affected = match existing {
                    Some(id) => diesel::update(companies::table.find(id))
                        .set((
                            companies::company_name.eq(&profile.company_name),
                            companies::industry.eq(&profile.industry),
                            companies::city.eq(&profile.city),
                            companies::schedule.eq(&profile.schedule),
                            companies::salary.eq(&profile.salary),
                            companies::communication_style.eq(style),
                            companies::created_at.eq(&now),
                        ))
                        .execute(conn)?,
                    None => diesel::insert_into(companies::table)
                        .values(NewCompany {
                            owner_id,
                            company_name: &profile.company_name,
                            industry: &profile.industry,
                            city: &profile.city,
                            schedule: &profile.schedule,
                            salary: &profile.salary,
                            communication_style: style,
                            created_at: &now,
                        })
                        .execute(conn)?,
                };
                Ok(affected)
            });

            match write_result {
                Ok(0) => return Ok(false),
                Ok(_) => {}
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                )) => return Ok(false),
                Err(e) => return Err(e),
            }

            // Confirm the write actually landed.
            let saved: Option<CompanyRecord> = companies::table
                .filter(companies::owner_id.eq(owner_id))
                .first(conn)
                .optional()?;
            Ok(saved.is_some_and(|record| record.company_name == profile.company_name))
        })
        .await?;

        if verified {
            info!("Company profile saved for owner {}", owner_id);
        } else {
            warn!("Company profile write not confirmed for owner {}", owner_id);
        }
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;

    fn profile(owner_id: i64, name: &str, city: &str) -> CompanyProfile {
        CompanyProfile {
            owner_id,
            company_name: name.to_string(),
            industry: "Розница".to_string(),
            city: city.to_string(),
            schedule: "5/2".to_string(),
            salary: "от 50000".to_string(),
            communication_style: CommunicationStyle::Friendly,
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates_in_place() {
        let (pool, _dir) = setup_test_db().await;
        let repo = CompanyRepository::new(pool);

        assert!(repo.upsert(&profile(10, "Магазин", "Москва")).await.unwrap());
        assert!(repo.upsert(&profile(10, "Магазин 2.0", "Казань")).await.unwrap());

        let saved = repo.get(10).await.unwrap().unwrap();
        assert_eq!(saved.company_name, "Магазин 2.0");
        assert_eq!(saved.city, "Казань");
        assert_eq!(saved.communication_style, CommunicationStyle::Friendly);
    }

    #[tokio::test]
    async fn empty_name_is_rejected_before_write() {
        let (pool, _dir) = setup_test_db().await;
        let repo = CompanyRepository::new(pool);

        assert!(!repo.upsert(&profile(11, "   ", "Москва")).await.unwrap());
        assert!(repo.get(11).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn one_profile_per_owner() {
        let (pool, _dir) = setup_test_db().await;
        let repo = CompanyRepository::new(pool.clone());

        repo.upsert(&profile(12, "А", "Москва")).await.unwrap();
        repo.upsert(&profile(12, "Б", "Москва")).await.unwrap();

        let count: i64 = run_blocking(pool, |conn| {
            use diesel::dsl::count_star;
            companies::table
                .filter(companies::owner_id.eq(12i64))
                .select(count_star())
                .first(conn)
        })
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
