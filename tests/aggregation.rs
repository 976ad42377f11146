//! End-to-end aggregation: fan-out, ranking, and idempotent persistence
//! against a real on-disk store.

use std::sync::Arc;

use async_trait::async_trait;

use gwork::aggregator::AggregationCoordinator;
use gwork::models::{
    CommunicationStyle, CompanyProfile, ExternalPosting, FetchOutcome, Source, VacancyBrief,
};
use gwork::repository::{
    create_pool, init_schema, CandidateRepository, CompanyRepository, PostingRepository,
    SqlitePool, VacancyRepository,
};
use gwork::scoring::HeuristicScorer;
use gwork::services::SearchService;
use gwork::sources::{SourceClient, SourceFetch};

struct StubClient {
    source: Source,
    fetch: SourceFetch,
}

#[async_trait]
impl SourceClient for StubClient {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _query: &str, _city: &str, _limit: usize) -> SourceFetch {
        self.fetch.clone()
    }
}

fn posting(source: Source, source_id: &str, city: &str, salary: &str) -> ExternalPosting {
    ExternalPosting {
        source,
        source_id: Some(source_id.to_string()),
        title: "Бариста".to_string(),
        company: Some("Кофейня".to_string()),
        salary: salary.to_string(),
        city: city.to_string(),
        url: format!("https://example.com/vacancy/{}", source_id),
        description: "Приготовление напитков, работа с гостями.".to_string(),
        requirements: vec!["Опыт работы от года".to_string()],
        published: "Сегодня".to_string(),
        is_info: false,
        raw_payload: serde_json::Value::Null,
    }
}

fn moscow_profile() -> CompanyProfile {
    CompanyProfile {
        owner_id: 1,
        company_name: "Кофейня Восход".to_string(),
        industry: "Общепит".to_string(),
        city: "Москва".to_string(),
        schedule: "2/2".to_string(),
        salary: "от 45000".to_string(),
        communication_style: CommunicationStyle::Friendly,
    }
}

async fn setup_db() -> (SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_pool(&dir.path().join("e2e.db")).unwrap();
    init_schema(pool.clone()).await.unwrap();
    (pool, dir)
}

fn coordinator_with(
    pool: SqlitePool,
    clients: Vec<Arc<dyn SourceClient>>,
) -> AggregationCoordinator {
    AggregationCoordinator::new(
        clients,
        Arc::new(HeuristicScorer::new()),
        PostingRepository::new(pool),
    )
}

#[tokio::test]
async fn moscow_posting_ranks_first_and_reruns_do_not_duplicate() {
    let (pool, _dir) = setup_db().await;
    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(StubClient {
            source: Source::Hh,
            fetch: SourceFetch::ok(vec![posting(
                Source::Hh,
                "moscow-1",
                "Москва",
                "40000 - 60000 ₽",
            )]),
        }),
        Arc::new(StubClient {
            source: Source::SuperJob,
            fetch: SourceFetch::ok(vec![posting(
                Source::SuperJob,
                "kazan-1",
                "Казань",
                "Не указана",
            )]),
        }),
    ];
    let coordinator = coordinator_with(pool.clone(), clients);
    let profile = moscow_profile();

    let first = coordinator
        .aggregate("бариста", "Москва", &profile, 5, None)
        .await;
    assert_eq!(first.postings.len(), 2);
    assert_eq!(first.postings[0].posting.city, "Москва");
    assert!(first.postings[0].score.value >= first.postings[1].score.value);
    assert_eq!(first.saved, 2);

    // Second identical aggregation: same natural keys, nothing new stored.
    let second = coordinator
        .aggregate("бариста", "Москва", &profile, 5, None)
        .await;
    assert_eq!(second.saved, 0);
    assert_eq!(second.duplicates, 2);

    let stored = PostingRepository::new(pool).count_real(1).await.unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn four_failing_sources_produce_empty_result_with_reasons() {
    let (pool, _dir) = setup_db().await;
    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(StubClient {
            source: Source::Hh,
            fetch: SourceFetch::failed(FetchOutcome::UpstreamError("HTTP 502".to_string())),
        }),
        Arc::new(StubClient {
            source: Source::SuperJob,
            fetch: SourceFetch::failed(FetchOutcome::AuthFailed),
        }),
        Arc::new(StubClient {
            source: Source::Habr,
            fetch: SourceFetch::failed(FetchOutcome::TierRequired),
        }),
        Arc::new(StubClient {
            source: Source::Avito,
            fetch: SourceFetch::failed(FetchOutcome::ParseDrift),
        }),
    ];
    let coordinator = coordinator_with(pool, clients);

    let result = coordinator
        .aggregate("бариста", "Москва", &moscow_profile(), 5, None)
        .await;

    assert!(result.postings.is_empty());
    assert!(result.info_notices.is_empty());
    assert_eq!(result.per_source.len(), 4);
    assert!(result.all_sources_failed());
    assert_eq!(result.saved, 0);
}

#[tokio::test]
async fn search_service_wires_profile_vacancy_and_candidates() {
    let (pool, _dir) = setup_db().await;
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StubClient {
        source: Source::Hh,
        fetch: SourceFetch::ok(vec![posting(
            Source::Hh,
            "hh-55",
            "Москва",
            "50000 - 70000 ₽",
        )]),
    })];
    let coordinator = Arc::new(coordinator_with(pool.clone(), clients));

    let companies = CompanyRepository::new(pool.clone());
    let candidates = CandidateRepository::new(pool.clone());
    let service = SearchService::new(
        coordinator,
        companies.clone(),
        VacancyRepository::new(pool.clone()),
        candidates.clone(),
    );

    assert!(companies.upsert(&moscow_profile()).await.unwrap());

    let brief = VacancyBrief {
        title: "Ищем бариста".to_string(),
        query: "бариста".to_string(),
        experience_required: true,
        schedule: "2/2".to_string(),
        salary_min: Some(40000),
        salary_max: Some(60000),
        critical_requirements: vec!["медкнижка".to_string()],
    };
    let (vacancy_id, result) = service
        .create_vacancy_and_find_candidates(1, &brief)
        .await
        .unwrap();

    assert_eq!(result.postings.len(), 1);
    let linked = candidates.list_for_vacancy(vacancy_id).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].ai_score as u8, result.postings[0].score.value);
    assert_eq!(linked[0].external_posting_id, result.postings[0].stored_id);
}
