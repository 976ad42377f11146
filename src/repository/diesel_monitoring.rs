//! Monitoring settings repository.
//!
//! One row per owner with the same upsert semantics as the company profile.

use chrono::Utc;
use diesel::prelude::*;

use super::diesel_models::MonitoringRecord;
use super::diesel_pool::{run_blocking, SqlitePool};
use super::{parse_datetime_opt, StoreError};
use crate::models::{MonitoringSettings, Source};
use crate::schema::monitoring_settings;

impl From<MonitoringRecord> for MonitoringSettings {
    fn from(record: MonitoringRecord) -> Self {
        let sources: Vec<String> =
            serde_json::from_str(&record.sources).unwrap_or_default();
        MonitoringSettings {
            owner_id: record.owner_id,
            city: record.city,
            keywords: serde_json::from_str(&record.keywords).unwrap_or_default(),
            interval_minutes: record.interval_minutes.max(1) as u32,
            is_active: record.is_active != 0,
            sources: sources.iter().filter_map(|s| Source::from_str(s)).collect(),
            last_check: parse_datetime_opt(record.last_check),
        }
    }
}

#[derive(Clone)]
pub struct MonitoringRepository {
    pool: SqlitePool,
}

impl MonitoringRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, owner_id: i64) -> Result<Option<MonitoringSettings>, StoreError> {
        let pool = self.pool.clone();
        let record = run_blocking(pool, move |conn| {
            monitoring_settings::table
                .filter(monitoring_settings::owner_id.eq(owner_id))
                .first::<MonitoringRecord>(conn)
                .optional()
        })
        .await?;
        Ok(record.map(MonitoringSettings::from))
    }

    /// Insert or update the settings row for `settings.owner_id`.
    pub async fn upsert(&self, settings: &MonitoringSettings) -> Result<(), StoreError> {
        let keywords = serde_json::to_string(&settings.keywords)?;
        let sources: Vec<&str> = settings.sources.iter().map(Source::as_str).collect();
        let sources = serde_json::to_string(&sources)?;
        let settings = settings.clone();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let now = Utc::now().to_rfc3339();
                let existing: Option<i32> = monitoring_settings::table
                    .filter(monitoring_settings::owner_id.eq(settings.owner_id))
                    .select(monitoring_settings::id)
                    .first(conn)
                    .optional()?;

                match existing {
                    Some(id) => {
                        diesel::update(monitoring_settings::table.find(id))
                            .set((
                                monitoring_settings::city.eq(&settings.city),
                                monitoring_settings::keywords.eq(&keywords),
                                monitoring_settings::interval_minutes
                                    .eq(settings.interval_minutes as i32),
                                monitoring_settings::is_active.eq(settings.is_active as i32),
                                monitoring_settings::sources.eq(&sources),
                                monitoring_settings::updated_at.eq(&now),
                            ))
                            .execute(conn)?;
                    }
                    None => {
                        diesel::insert_into(monitoring_settings::table)
                            .values((
                                monitoring_settings::owner_id.eq(settings.owner_id),
                                monitoring_settings::city.eq(&settings.city),
                                monitoring_settings::keywords.eq(&keywords),
                                monitoring_settings::interval_minutes
                                    .eq(settings.interval_minutes as i32),
                                monitoring_settings::is_active.eq(settings.is_active as i32),
                                monitoring_settings::sources.eq(&sources),
                                monitoring_settings::created_at.eq(&now),
                                monitoring_settings::updated_at.eq(&now),
                            ))
                            .execute(conn)?;
                    }
                }
                Ok(())
            })
        })
        .await?;
        Ok(())
    }

    /// Flip the active flag without touching the rest of the settings.
    pub async fn set_active(&self, owner_id: i64, is_active: bool) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        let affected = run_blocking(pool, move |conn| {
            diesel::update(
                monitoring_settings::table.filter(monitoring_settings::owner_id.eq(owner_id)),
            )
            .set((
                monitoring_settings::is_active.eq(is_active as i32),
                monitoring_settings::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(conn)
        })
        .await?;
        Ok(affected > 0)
    }

    /// Record a completed polling pass.
    pub async fn touch_last_check(&self, owner_id: i64) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        run_blocking(pool, move |conn| {
            diesel::update(
                monitoring_settings::table.filter(monitoring_settings::owner_id.eq(owner_id)),
            )
            .set(monitoring_settings::last_check.eq(Utc::now().to_rfc3339()))
            .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Owners with monitoring switched on.
    pub async fn list_active(&self) -> Result<Vec<MonitoringSettings>, StoreError> {
        let pool = self.pool.clone();
        let records = run_blocking(pool, move |conn| {
            monitoring_settings::table
                .filter(monitoring_settings::is_active.eq(1))
                .load::<MonitoringRecord>(conn)
        })
        .await?;
        Ok(records.into_iter().map(MonitoringSettings::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;

    fn settings(owner_id: i64, active: bool) -> MonitoringSettings {
        MonitoringSettings {
            owner_id,
            city: "Москва".to_string(),
            keywords: vec!["бариста".to_string(), "официант".to_string()],
            interval_minutes: 60,
            is_active: active,
            sources: vec![Source::Hh, Source::Avito],
            last_check: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_one_row_per_owner() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MonitoringRepository::new(pool);

        repo.upsert(&settings(1, true)).await.unwrap();
        let mut updated = settings(1, true);
        updated.keywords = vec!["повар".to_string()];
        repo.upsert(&updated).await.unwrap();

        let loaded = repo.get(1).await.unwrap().unwrap();
        assert_eq!(loaded.keywords, vec!["повар"]);
        assert_eq!(loaded.sources, vec![Source::Hh, Source::Avito]);
        assert_eq!(repo.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_active_and_touch() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MonitoringRepository::new(pool);

        repo.upsert(&settings(2, false)).await.unwrap();
        assert!(repo.list_active().await.unwrap().is_empty());

        assert!(repo.set_active(2, true).await.unwrap());
        assert_eq!(repo.list_active().await.unwrap().len(), 1);

        repo.touch_last_check(2).await.unwrap();
        assert!(repo.get(2).await.unwrap().unwrap().last_check.is_some());
    }

    #[tokio::test]
    async fn set_active_for_unknown_owner_is_false() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MonitoringRepository::new(pool);
        assert!(!repo.set_active(404, true).await.unwrap());
    }
}
