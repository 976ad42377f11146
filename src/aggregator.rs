//! Multi-source aggregation: fan-out, dedup, scoring, ranking, persistence.
//!
//! One aggregation call dispatches every enabled source client concurrently,
//! folds the surviving postings through the scoring engine, ranks them, and
//! persists each one through the idempotent upsert. Source failures are
//! contained: they become per-source reports on the result, never errors.

use std::sync::Arc;

use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::models::{CompanyProfile, ExternalPosting, FetchOutcome, Source};
use crate::normalize::normalize_title;
use crate::repository::{PostingRepository, UpsertOutcome};
use crate::scoring::{Score, ScoreEngine};
use crate::sources::SourceClient;

/// Per-source observability record attached to every result.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    pub count: usize,
    pub outcome: FetchOutcome,
}

/// One ranked posting with its score and, when persisted, its stored row id.
#[derive(Debug, Clone)]
pub struct ScoredPosting {
    pub posting: ExternalPosting,
    pub score: Score,
    pub stored_id: Option<i32>,
}

/// Outcome of one aggregation call.
#[derive(Debug, Clone, Default)]
pub struct RankedResult {
    /// Scored real postings, best first.
    pub postings: Vec<ScoredPosting>,
    /// Informational records explaining source-level conditions (paid tier,
    /// dead credentials). Not scored, not deduplicated, not persisted.
    pub info_notices: Vec<ExternalPosting>,
    /// One report per dispatched source.
    pub per_source: Vec<SourceReport>,
    /// Rows newly written by this call.
    pub saved: usize,
    /// Postings skipped because their natural key was already stored.
    pub duplicates: usize,
}

impl RankedResult {
    /// True when every dispatched source failed.
    pub fn all_sources_failed(&self) -> bool {
        !self.per_source.is_empty() && self.per_source.iter().all(|r| !r.outcome.is_ok())
    }
}

/// Dedup fingerprint: the stable source id when present, otherwise a content
/// hash over the source and normalized title.
fn fingerprint(posting: &ExternalPosting) -> String {
    match posting.source_id.as_deref() {
        Some(id) => format!("{}:{}", posting.source, id),
        None => {
            let mut hasher = Sha256::new();
            hasher.update(posting.source.as_str().as_bytes());
            hasher.update(b"\x00");
            hasher.update(normalize_title(&posting.title).as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

pub struct AggregationCoordinator {
    clients: Vec<Arc<dyn SourceClient>>,
    scorer: Arc<dyn ScoreEngine>,
    postings: PostingRepository,
}

impl AggregationCoordinator {
    pub fn new(
        clients: Vec<Arc<dyn SourceClient>>,
        scorer: Arc<dyn ScoreEngine>,
        postings: PostingRepository,
    ) -> Self {
        Self {
            clients,
            scorer,
            postings,
        }
    }

    /// Run one aggregation for an owner's profile.
    ///
    /// `enabled` restricts the dispatched sources; `None` dispatches all.
    /// Persistence is per posting as results are ranked (persist-as-you-go):
    /// a row that fails to store is logged and skipped, the batch continues.
    pub async fn aggregate(
        &self,
        query: &str,
        city: &str,
        profile: &CompanyProfile,
        per_source_limit: usize,
        enabled: Option<&[Source]>,
    ) -> RankedResult {
        let clients: Vec<&Arc<dyn SourceClient>> = self
            .clients
            .iter()
            .filter(|c| enabled.map_or(true, |set| set.contains(&c.source())))
            .collect();

        info!(
            "Aggregating '{}' in {} across {} sources",
            query,
            city,
            clients.len()
        );

        // Concurrent, failure-isolated fan-out: fetch never errors by
        // contract, so one source cannot cancel the others.
        let fetches = join_all(clients.iter().map(|client| async {
            let fetch = client.fetch(query, city, per_source_limit).await;
            (client.source(), fetch)
        }))
        .await;

        let mut result = RankedResult::default();
        let mut seen = HashSet::new();
        let mut ranked: Vec<(usize, ScoredPosting)> = Vec::new();
        let mut fetch_order = 0usize;

        for (source, fetch) in fetches {
            let real_count = fetch.postings.iter().filter(|p| !p.is_info).count();
            result.per_source.push(SourceReport {
                source,
                count: real_count,
                outcome: fetch.outcome.clone(),
            });

            for posting in fetch.postings {
                if posting.is_info {
                    result.info_notices.push(posting);
                    continue;
                }
                if !seen.insert(fingerprint(&posting)) {
                    debug!("Dropping duplicate posting: {}", posting.title);
                    continue;
                }

                let score = self.scorer.score(&posting, profile).await;
                ranked.push((
                    fetch_order,
                    ScoredPosting {
                        posting,
                        score,
                        stored_id: None,
                    },
                ));
                fetch_order += 1;
            }
        }

        // Score descending; ties break on source priority, then fetch order.
        ranked.sort_by(|(order_a, a), (order_b, b)| {
            b.score
                .value
                .cmp(&a.score.value)
                .then_with(|| {
                    a.posting
                        .source
                        .priority()
                        .cmp(&b.posting.source.priority())
                })
                .then_with(|| order_a.cmp(order_b))
        });

        for (_, mut scored) in ranked {
            match self
                .postings
                .upsert(&scored.posting, Some(&scored.score), profile.owner_id)
                .await
            {
                Ok(UpsertOutcome::Inserted(id)) => {
                    scored.stored_id = Some(id);
                    result.saved += 1;
                }
                Ok(UpsertOutcome::AlreadyExists) => result.duplicates += 1,
                Err(e) => {
                    warn!("Failed to store posting '{}': {}", scored.posting.title, e);
                }
            }
            result.postings.push(scored);
        }

        info!(
            "Aggregation done: {} ranked, {} saved, {} duplicates, {} notices",
            result.postings.len(),
            result.saved,
            result.duplicates,
            result.info_notices.len()
        );
        result
    }
}
