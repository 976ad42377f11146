//! Process-scoped service wiring.
//!
//! All upstream clients, the rate limiter, the scoring engine, and the
//! repositories are constructed once at startup and passed by handle into the
//! services. Nothing here is a global: tearing down the `App` tears down the
//! whole dependency graph.

use std::sync::Arc;

use anyhow::Context;

use crate::aggregator::AggregationCoordinator;
use crate::config::Settings;
use crate::llm::LlmScorer;
use crate::repository::{
    self, CandidateRepository, CompanyRepository, MonitoringRepository, PostingRepository,
    SqlitePool, VacancyRepository,
};
use crate::scoring::{HeuristicScorer, ScoreEngine};
use crate::services::{SearchService, VacancyMonitor};
use crate::sources::habr::HabrCredentials;
use crate::sources::{AvitoScraper, HabrClient, HhClient, RateLimiter, SourceClient, SuperJobClient};

pub struct App {
    pub pool: SqlitePool,
    pub companies: CompanyRepository,
    pub vacancies: VacancyRepository,
    pub candidates: CandidateRepository,
    pub postings: PostingRepository,
    pub monitoring: MonitoringRepository,
    pub coordinator: Arc<AggregationCoordinator>,
    pub search: SearchService,
    pub monitor: Arc<VacancyMonitor>,
}

impl App {
    /// Build the full service graph from settings: open the pool, apply the
    /// schema, and wire the four source clients behind one shared limiter.
    pub async fn build(settings: &Settings) -> anyhow::Result<App> {
        settings
            .ensure_directories()
            .context("creating data directory")?;
        let pool = repository::create_pool(&settings.database_path())
            .context("opening database pool")?;
        repository::init_schema(pool.clone())
            .await
            .context("applying database schema")?;

        let limiter = RateLimiter::new();
        let habr_credentials = match (
            settings.credentials.habr_client_id.clone(),
            settings.credentials.habr_client_secret.clone(),
        ) {
            (Some(client_id), Some(client_secret)) => Some(HabrCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let clients: Vec<Arc<dyn SourceClient>> = vec![
            Arc::new(HhClient::new(limiter.clone())),
            Arc::new(SuperJobClient::new(
                limiter.clone(),
                settings.credentials.superjob_api_key.clone(),
            )),
            Arc::new(HabrClient::new(limiter.clone(), habr_credentials)),
            Arc::new(AvitoScraper::new(limiter)),
        ];

        let scorer: Arc<dyn ScoreEngine> = if settings.llm.enabled {
            Arc::new(LlmScorer::new(settings.llm.clone()))
        } else {
            Arc::new(HeuristicScorer::new())
        };

        let companies = CompanyRepository::new(pool.clone());
        let vacancies = VacancyRepository::new(pool.clone());
        let candidates = CandidateRepository::new(pool.clone());
        let postings = PostingRepository::new(pool.clone());
        let monitoring = MonitoringRepository::new(pool.clone());

        let coordinator = Arc::new(AggregationCoordinator::new(
            clients,
            scorer,
            postings.clone(),
        ));
        let search = SearchService::new(
            coordinator.clone(),
            companies.clone(),
            vacancies.clone(),
            candidates.clone(),
        )
        .with_per_source_limit(settings.per_source_limit);
        let monitor = Arc::new(VacancyMonitor::new(
            coordinator.clone(),
            companies.clone(),
            monitoring.clone(),
        ));

        Ok(App {
            pool,
            companies,
            vacancies,
            candidates,
            postings,
            monitoring,
            coordinator,
            search,
            monitor,
        })
    }
}
