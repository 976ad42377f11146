//! Background vacancy monitoring.
//!
//! One cancellable recurring task per owner, keyed by owner id. Starting is
//! idempotent (an existing task is replaced), stopping aborts the task; the
//! abort lands at the task's next suspension point. Each tick re-reads the
//! owner's settings and feeds the same aggregation contract the interactive
//! search uses, so idempotent upserts make overlapping collections safe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregator::AggregationCoordinator;
use crate::repository::{CompanyRepository, MonitoringRepository, StoreError};

/// Per-source limit for background collection passes.
const MONITOR_PER_SOURCE_LIMIT: usize = 20;

/// Everything one collection pass needs; cloned into each owner's task.
#[derive(Clone)]
struct Collector {
    coordinator: Arc<AggregationCoordinator>,
    companies: CompanyRepository,
    settings: MonitoringRepository,
}

impl Collector {
    /// One collection pass: aggregate every configured keyword, then stamp
    /// the settings row.
    async fn collect_once(&self, owner_id: i64) -> Result<usize, StoreError> {
        let Some(settings) = self.settings.get(owner_id).await? else {
            return Ok(0);
        };
        let Some(profile) = self.companies.get(owner_id).await? else {
            return Ok(0);
        };

        let city = if settings.city.is_empty() {
            profile.city.clone()
        } else {
            settings.city.clone()
        };
        let sources = if settings.sources.is_empty() {
            None
        } else {
            Some(settings.sources.as_slice())
        };

        let mut saved = 0;
        for keyword in &settings.keywords {
            let result = self
                .coordinator
                .aggregate(keyword, &city, &profile, MONITOR_PER_SOURCE_LIMIT, sources)
                .await;
            saved += result.saved;
        }

        self.settings.touch_last_check(owner_id).await?;
        info!(
            "Collection pass for owner {} saved {} new postings",
            owner_id, saved
        );
        Ok(saved)
    }
}

pub struct VacancyMonitor {
    collector: Collector,
    tasks: Mutex<HashMap<i64, JoinHandle<()>>>,
}

impl VacancyMonitor {
    pub fn new(
        coordinator: Arc<AggregationCoordinator>,
        companies: CompanyRepository,
        settings: MonitoringRepository,
    ) -> Self {
        Self {
            collector: Collector {
                coordinator,
                companies,
                settings,
            },
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) monitoring for an owner.
    ///
    /// Returns false when the owner has no active monitoring settings or no
    /// profile. The first collection pass runs immediately, then on the
    /// configured interval.
    pub async fn start(&self, owner_id: i64) -> Result<bool, StoreError> {
        let Some(settings) = self.collector.settings.get(owner_id).await? else {
            warn!("No monitoring settings for owner {}", owner_id);
            return Ok(false);
        };
        if !settings.is_active {
            warn!("Monitoring for owner {} is not active", owner_id);
            return Ok(false);
        }
        if self.collector.companies.get(owner_id).await?.is_none() {
            warn!("No company profile for owner {}, not monitoring", owner_id);
            return Ok(false);
        }

        let collector = self.collector.clone();
        let interval = Duration::from_secs(u64::from(settings.interval_minutes.max(1)) * 60);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = collector.collect_once(owner_id).await {
                    warn!("Collection pass failed for owner {}: {}", owner_id, e);
                }
                tokio::time::sleep(interval).await;
            }
        });

        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.insert(owner_id, handle) {
            previous.abort();
        }
        info!(
            "Monitoring started for owner {} (every {} min)",
            owner_id, settings.interval_minutes
        );
        Ok(true)
    }

    /// Stop monitoring for an owner. Idempotent: stopping an owner without a
    /// running task is a no-op.
    pub async fn stop(&self, owner_id: i64) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.remove(&owner_id) {
            Some(handle) => {
                handle.abort();
                info!("Monitoring stopped for owner {}", owner_id);
                true
            }
            None => false,
        }
    }

    /// Whether a monitoring task is currently registered for the owner.
    pub async fn is_running(&self, owner_id: i64) -> bool {
        self.tasks.lock().await.contains_key(&owner_id)
    }

    /// Run one collection pass synchronously (used by the CLI and the tests;
    /// the recurring tasks run the same code).
    pub async fn collect_once(&self, owner_id: i64) -> Result<usize, StoreError> {
        self.collector.collect_once(owner_id).await
    }
}

impl Drop for VacancyMonitor {
    fn drop(&mut self) {
        // No collection task may outlive the monitor that owns it.
        if let Ok(tasks) = self.tasks.try_lock() {
            for handle in tasks.values() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CommunicationStyle, CompanyProfile, ExternalPosting, MonitoringSettings, Source,
    };
    use crate::repository::test_support::setup_test_db;
    use crate::repository::PostingRepository;
    use crate::scoring::HeuristicScorer;
    use crate::sources::{SourceClient, SourceFetch};
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl SourceClient for StubClient {
        fn source(&self) -> Source {
            Source::Hh
        }

        async fn fetch(&self, query: &str, city: &str, _limit: usize) -> SourceFetch {
            SourceFetch::ok(vec![ExternalPosting {
                source: Source::Hh,
                source_id: Some(format!("id-{}", query)),
                title: query.to_string(),
                company: None,
                salary: "Не указана".to_string(),
                city: city.to_string(),
                url: format!("https://hh.ru/vacancy/{}", query.len()),
                description: String::new(),
                requirements: vec![],
                published: "Сегодня".to_string(),
                is_info: false,
                raw_payload: serde_json::Value::Null,
            }])
        }
    }

    async fn monitor() -> (VacancyMonitor, tempfile::TempDir) {
        let (pool, dir) = setup_test_db().await;
        let coordinator = Arc::new(AggregationCoordinator::new(
            vec![Arc::new(StubClient)],
            Arc::new(HeuristicScorer::new()),
            PostingRepository::new(pool.clone()),
        ));
        let monitor = VacancyMonitor::new(
            coordinator,
            CompanyRepository::new(pool.clone()),
            MonitoringRepository::new(pool),
        );
        (monitor, dir)
    }

    fn profile(owner_id: i64) -> CompanyProfile {
        CompanyProfile {
            owner_id,
            company_name: "Компания".to_string(),
            industry: "Розница".to_string(),
            city: "Москва".to_string(),
            schedule: "5/2".to_string(),
            salary: String::new(),
            communication_style: CommunicationStyle::Neutral,
        }
    }

    fn settings(owner_id: i64) -> MonitoringSettings {
        MonitoringSettings {
            owner_id,
            city: "Москва".to_string(),
            keywords: vec!["бариста".to_string(), "официант".to_string()],
            interval_minutes: 60,
            is_active: true,
            sources: vec![Source::Hh],
            last_check: None,
        }
    }

    #[tokio::test]
    async fn collect_once_saves_and_stamps() {
        let (monitor, _dir) = monitor().await;
        monitor.collector.companies.upsert(&profile(1)).await.unwrap();
        monitor.collector.settings.upsert(&settings(1)).await.unwrap();

        let saved = monitor.collect_once(1).await.unwrap();
        assert_eq!(saved, 2);
        let stamped = monitor.collector.settings.get(1).await.unwrap().unwrap();
        assert!(stamped.last_check.is_some());

        // Re-collection is idempotent.
        assert_eq!(monitor.collect_once(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn start_requires_active_settings_and_profile() {
        let (monitor, _dir) = monitor().await;
        assert!(!monitor.start(1).await.unwrap());

        monitor.collector.companies.upsert(&profile(1)).await.unwrap();
        let mut inactive = settings(1);
        inactive.is_active = false;
        monitor.collector.settings.upsert(&inactive).await.unwrap();
        assert!(!monitor.start(1).await.unwrap());

        monitor.collector.settings.set_active(1, true).await.unwrap();
        assert!(monitor.start(1).await.unwrap());
        assert!(monitor.is_running(1).await);
        assert!(monitor.stop(1).await);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_twice_is_noop() {
        let (monitor, _dir) = monitor().await;
        monitor.collector.companies.upsert(&profile(2)).await.unwrap();
        monitor.collector.settings.upsert(&settings(2)).await.unwrap();

        assert!(monitor.start(2).await.unwrap());
        assert!(monitor.start(2).await.unwrap());
        assert!(monitor.is_running(2).await);

        assert!(monitor.stop(2).await);
        assert!(!monitor.stop(2).await);
        assert!(!monitor.is_running(2).await);
    }
}
