//! External posting repository.
//!
//! The natural key is `(source, source_id, owner_id)`. Upserting an existing
//! key is an idempotent no-op reported as `AlreadyExists`; postings without a
//! stable source id always insert as new rows. Informational records are
//! excluded from "real posting" counts.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;

use super::diesel_models::{NewPosting, PostingRecord};
use super::diesel_pool::{run_blocking, SqlitePool};
use super::{parse_datetime, parse_string_list, StoreError};
use crate::models::ExternalPosting;
use crate::schema::external_postings;
use crate::scoring::Score;

/// Result of one posting upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i32),
    AlreadyExists,
}

impl UpsertOutcome {
    pub fn inserted_id(&self) -> Option<i32> {
        match self {
            UpsertOutcome::Inserted(id) => Some(*id),
            UpsertOutcome::AlreadyExists => None,
        }
    }
}

/// A stored posting row with its identity and analysis payload.
#[derive(Debug, Clone)]
pub struct StoredPosting {
    pub id: i32,
    pub source: String,
    pub source_id: Option<String>,
    pub title: String,
    pub salary: String,
    pub city: String,
    pub url: String,
    pub requirements: Vec<String>,
    pub status: String,
    pub ai_analysis: Option<Score>,
    pub collected_at: DateTime<Utc>,
}

impl From<PostingRecord> for StoredPosting {
    fn from(record: PostingRecord) -> Self {
        StoredPosting {
            id: record.id,
            source: record.source,
            source_id: record.source_id,
            title: record.title,
            salary: record.salary,
            city: record.city,
            url: record.url,
            requirements: parse_string_list(&record.requirements),
            status: record.status,
            ai_analysis: serde_json::from_str(&record.ai_analysis).ok(),
            collected_at: parse_datetime(&record.collected_at),
        }
    }
}

#[derive(Clone)]
pub struct PostingRepository {
    pool: SqlitePool,
}

impl PostingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert of a scored posting for one owner.
    ///
    /// Runs in a single transaction: the existence check and the insert are
    /// not separately observable. A concurrent writer that loses the race
    /// hits the unique index and also resolves to `AlreadyExists`.
    pub async fn upsert(
        &self,
        posting: &ExternalPosting,
        score: Option<&Score>,
        owner_id: i64,
    ) -> Result<UpsertOutcome, StoreError> {
        let source_tag = posting.source_tag();
        let requirements = serde_json::to_string(&posting.requirements)?;
        let ai_analysis = match score {
            Some(score) => serde_json::to_string(score)?,
            None => "{}".to_string(),
        };
        let raw_payload = serde_json::to_string(&posting.raw_payload)?;
        let log_tag = source_tag.clone();
        let posting = posting.clone();
        let pool = self.pool.clone();

        let outcome = run_blocking(pool, move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                if let Some(source_id) = posting.source_id.as_deref() {
                    let existing: Option<i32> = external_postings::table
                        .filter(external_postings::source.eq(&source_tag))
                        .filter(external_postings::source_id.eq(source_id))
                        .filter(external_postings::owner_id.eq(owner_id))
                        .select(external_postings::id)
                        .first(conn)
                        .optional()?;
                    if existing.is_some() {
                        return Ok(UpsertOutcome::AlreadyExists);
                    }
                }

                let now = Utc::now().to_rfc3339();
                let insert = diesel::insert_into(external_postings::table)
                    .values(NewPosting {
                        source: &source_tag,
                        source_id: posting.source_id.as_deref(),
                        title: &posting.title,
                        company: posting.company.as_deref(),
                        salary: &posting.salary,
                        city: &posting.city,
                        url: &posting.url,
                        description: &posting.description,
                        requirements: &requirements,
                        published: &posting.published,
                        owner_id,
                        status: "new",
                        collected_at: &now,
                        ai_analysis: &ai_analysis,
                        raw_payload: &raw_payload,
                    })
                    .execute(conn);

                match insert {
                    Ok(_) => {
                        let id: i32 = diesel::select(diesel::dsl::sql::<
                            diesel::sql_types::Integer,
                        >("last_insert_rowid()"))
                        .get_result(conn)?;
                        Ok(UpsertOutcome::Inserted(id))
                    }
                    // Lost a race on the natural key: same as already present.
                    Err(diesel::result::Error::DatabaseError(
                        diesel::result::DatabaseErrorKind::UniqueViolation,
                        _,
                    )) => Ok(UpsertOutcome::AlreadyExists),
                    Err(e) => Err(e),
                }
            })
        })
        .await?;

        if let UpsertOutcome::Inserted(id) = outcome {
            debug!("Stored external posting {} from {}", id, log_tag);
        }
        Ok(outcome)
    }

    /// Recent postings for an owner, optionally filtered by source tag.
    pub async fn list(
        &self,
        owner_id: i64,
        source: Option<String>,
        limit: i64,
    ) -> Result<Vec<StoredPosting>, StoreError> {
        let pool = self.pool.clone();
        let records = run_blocking(pool, move |conn| {
            let mut query = external_postings::table
                .filter(external_postings::owner_id.eq(owner_id))
                .order(external_postings::collected_at.desc())
                .limit(limit)
                .into_boxed();
            if let Some(ref source) = source {
                query = query.filter(external_postings::source.eq(source));
            }
            query.load::<PostingRecord>(conn)
        })
        .await?;
        Ok(records.into_iter().map(StoredPosting::from).collect())
    }

    /// Count stored real postings for an owner. Informational rows (source
    /// tagged `*_info`) are not real postings.
    pub async fn count_real(&self, owner_id: i64) -> Result<u64, StoreError> {
        let pool = self.pool.clone();
        let count: i64 = run_blocking(pool, move |conn| {
            use diesel::dsl::count_star;
            external_postings::table
                .filter(external_postings::owner_id.eq(owner_id))
                .filter(external_postings::source.not_like("%_info"))
                .select(count_star())
                .first(conn)
        })
        .await?;
        Ok(count as u64)
    }

    /// Soft status update of a stored posting.
    pub async fn update_status(&self, posting_id: i32, status: String) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        let affected = run_blocking(pool, move |conn| {
            diesel::update(external_postings::table.find(posting_id))
                .set(external_postings::status.eq(&status))
                .execute(conn)
        })
        .await?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::repository::test_support::setup_test_db;

    fn posting(source_id: Option<&str>, title: &str) -> ExternalPosting {
        ExternalPosting {
            source: Source::Avito,
            source_id: source_id.map(str::to_string),
            title: title.to_string(),
            company: None,
            salary: "50 000 ₽".to_string(),
            city: "Москва".to_string(),
            url: "https://www.avito.ru/moskva/vakansii/barista_123".to_string(),
            description: "Описание".to_string(),
            requirements: vec!["Опыт от года".to_string()],
            published: "Сегодня".to_string(),
            is_info: false,
            raw_payload: serde_json::json!({"q": "бариста"}),
        }
    }

    #[tokio::test]
    async fn double_ingest_stores_one_row() {
        let (pool, _dir) = setup_test_db().await;
        let repo = PostingRepository::new(pool);

        let first = repo
            .upsert(&posting(Some("av_123"), "Бариста"), None, 1)
            .await
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = repo
            .upsert(&posting(Some("av_123"), "Бариста"), None, 1)
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::AlreadyExists);

        assert_eq!(repo.count_real(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_key_different_owner_inserts() {
        let (pool, _dir) = setup_test_db().await;
        let repo = PostingRepository::new(pool);

        repo.upsert(&posting(Some("av_123"), "Бариста"), None, 1)
            .await
            .unwrap();
        let other_owner = repo
            .upsert(&posting(Some("av_123"), "Бариста"), None, 2)
            .await
            .unwrap();
        assert!(matches!(other_owner, UpsertOutcome::Inserted(_)));
    }

    #[tokio::test]
    async fn postings_without_source_id_always_insert() {
        let (pool, _dir) = setup_test_db().await;
        let repo = PostingRepository::new(pool);

        for _ in 0..2 {
            let outcome = repo
                .upsert(&posting(None, "Без идентификатора"), None, 1)
                .await
                .unwrap();
            assert!(matches!(outcome, UpsertOutcome::Inserted(_)));
        }
        assert_eq!(repo.count_real(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn info_rows_are_not_real_postings() {
        let (pool, _dir) = setup_test_db().await;
        let repo = PostingRepository::new(pool);

        let mut info = posting(None, "Нужен тариф");
        info.is_info = true;
        repo.upsert(&info, None, 1).await.unwrap();
        assert_eq!(repo.count_real(1).await.unwrap(), 0);

        let listed = repo.list(1, Some("avito_info".to_string()), 10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn score_round_trips_through_ai_analysis() {
        let (pool, _dir) = setup_test_db().await;
        let repo = PostingRepository::new(pool);

        let score = Score::from_value(85);
        repo.upsert(&posting(Some("av_9"), "Бариста"), Some(&score), 1)
            .await
            .unwrap();

        let listed = repo.list(1, None, 10).await.unwrap();
        let stored_score = listed[0].ai_analysis.as_ref().unwrap();
        assert_eq!(stored_score.value, 85);
        assert_eq!(stored_score.verdict, "Отличный кандидат");
    }
}
