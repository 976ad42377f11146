//! Service layer for gwork business logic.
//!
//! Domain logic separated from surface concerns: the search service is the
//! contract the dialogue layer calls, the monitor drives background
//! collection. Both feed the same aggregation coordinator.

pub mod monitor;
pub mod search;

pub use monitor::VacancyMonitor;
pub use search::{SearchService, ServiceError, DEFAULT_PER_SOURCE_LIMIT};
