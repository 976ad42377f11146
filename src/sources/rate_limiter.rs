//! Per-source minimum request spacing.
//!
//! Each upstream gets a fixed floor between consecutive outbound requests.
//! Callers that would violate the floor block until their slot arrives; slots
//! are reserved under the lock so concurrent callers serialize instead of
//! racing for the same window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::models::Source;

/// Default spacing for the stricter upstreams.
pub const STRICT_SPACING: Duration = Duration::from_secs(2);
/// Default spacing for the lenient APIs.
pub const DEFAULT_SPACING: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct SourceSlot {
    spacing: Duration,
    /// The instant the next request is allowed to start.
    next_allowed: Instant,
}

/// Process-scoped limiter shared by every aggregation call.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    slots: Arc<Mutex<HashMap<Source, SourceSlot>>>,
}

impl RateLimiter {
    /// Create a limiter with per-source floors: the scraped marketplace and
    /// SuperJob get the strict floor, the rest the default.
    pub fn new() -> Self {
        let mut slots = HashMap::new();
        for source in Source::all() {
            let spacing = match source {
                Source::Avito | Source::SuperJob => STRICT_SPACING,
                _ => DEFAULT_SPACING,
            };
            slots.insert(
                source,
                SourceSlot {
                    spacing,
                    next_allowed: Instant::now(),
                },
            );
        }
        Self {
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    /// Override the spacing floor for one source.
    pub async fn set_spacing(&self, source: Source, spacing: Duration) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(&source) {
            slot.spacing = spacing;
        }
    }

    /// Reserve the next request slot for `source` and wait until it arrives.
    ///
    /// Reservation happens under the lock, so two concurrent callers get
    /// consecutive slots rather than the same one.
    pub async fn acquire(&self, source: Source) {
        let wait = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let slot = slots.entry(source).or_insert_with(|| SourceSlot {
                spacing: DEFAULT_SPACING,
                next_allowed: now,
            });
            let start = slot.next_allowed.max(now);
            slot.next_allowed = start + slot.spacing;
            start.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", source, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Back off one full spacing interval after an upstream rate-limit signal.
    pub async fn backoff(&self, source: Source) {
        let wait = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let slot = slots.entry(source).or_insert_with(|| SourceSlot {
                spacing: DEFAULT_SPACING,
                next_allowed: now,
            });
            slot.next_allowed = slot.next_allowed.max(now) + slot.spacing;
            slot.spacing
        };
        debug!("Backing off {} for {:?}", source, wait);
        tokio::time::sleep(wait).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
