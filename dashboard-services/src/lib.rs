//! Business logic services for the stock dashboard
//!
//! This crate builds on the service client: it aggregates per-ticker data
//! across subsystems, caches and retries queries, monitors service health,
//! tracks batch operations and drives real-time polling.

pub mod aggregator;
pub mod batch_tracker;
pub mod health_monitor;
pub mod queries;
pub mod query;
pub mod query_cache;
pub mod realtime;

pub use aggregator::AnalysisAggregator;
pub use batch_tracker::BatchTracker;
pub use health_monitor::{HealthMonitor, MIN_POLL_PERIOD};
pub use query::{Query, QueryOptions, QueryState};
pub use query_cache::{cache_key, CacheHit, QueryCache};
pub use realtime::{FeedState, RealTimeFeed};
