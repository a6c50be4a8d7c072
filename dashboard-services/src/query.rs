//! Cached Query Layer
//!
//! A [`Query`] binds one named async operation to caching, retry and
//! cancellation policy, and publishes its observable state on a watch
//! channel. Each instance models one consumer: starting a new call aborts the
//! previous in-flight one, and only the newest call may touch state or cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashboard_core::{DashboardError, DashboardResult};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, instrument, warn};

use crate::query_cache::{cache_key, QueryCache};

/// Caching and retry policy for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub enable_cache: bool,
    /// How long a fetched value stays fresh
    pub cache_time: Duration,
    /// Total attempts, including the first
    pub retry_count: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before the next one
    pub retry_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_time: Duration::from_secs(5 * 60),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl QueryOptions {
    /// Live prices change quickly
    pub fn price() -> Self {
        Self::default().with_cache_time(Duration::from_secs(2 * 60))
    }

    pub fn technical() -> Self {
        Self::default()
    }

    /// Fundamentals change slowly
    pub fn fundamental() -> Self {
        Self::default().with_cache_time(Duration::from_secs(60 * 60))
    }

    pub fn news() -> Self {
        Self::default().with_cache_time(Duration::from_secs(10 * 60))
    }

    pub fn social() -> Self {
        Self::default().with_cache_time(Duration::from_secs(15 * 60))
    }

    pub fn ml() -> Self {
        Self::default().with_cache_time(Duration::from_secs(30 * 60))
    }

    pub fn complete_analysis() -> Self {
        Self::default().with_retry(2, Duration::from_secs(1))
    }

    pub fn latest_predictions() -> Self {
        Self::default()
    }

    pub fn ml_performance() -> Self {
        Self::default().with_cache_time(Duration::from_secs(10 * 60))
    }

    pub fn prediction_history() -> Self {
        Self::default().with_cache_time(Duration::from_secs(15 * 60))
    }

    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }
}

/// Observable state of a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub loading: bool,
    /// Failure of the last applied call
    pub error: Option<DashboardError>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            last_updated: None,
        }
    }
}

type Fetcher<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, DashboardResult<T>> + Send + Sync>;

/// Bookkeeping for the call currently allowed to apply its result
#[derive(Default)]
struct InFlight {
    generation: u64,
    handle: Option<AbortHandle>,
}

/// Aborts the fetch task if the awaiting call is dropped early, and clears
/// `loading` when that call was still the newest
struct CallGuard<'a, T> {
    handle: AbortHandle,
    generation: u64,
    in_flight: &'a Mutex<InFlight>,
    state: &'a watch::Sender<QueryState<T>>,
    armed: bool,
}

impl<T> Drop for CallGuard<'_, T> {
    fn drop(&mut self) {
        self.handle.abort();
        if !self.armed {
            return;
        }
        let mut guard = self.in_flight.lock();
        if guard.generation == self.generation {
            guard.handle = None;
            self.state.send_modify(|state| state.loading = false);
        }
    }
}

/// One consumer's view of a cached, retried, cancellable operation
pub struct Query<A, T> {
    name: String,
    fetcher: Fetcher<A, T>,
    options: QueryOptions,
    cache: QueryCache<T>,
    state: watch::Sender<QueryState<T>>,
    in_flight: Mutex<InFlight>,
}

impl<A, T> Query<A, T>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create a query for the operation `name`, fetched by `fetch`
    pub fn new<F, Fut>(name: impl Into<String>, options: QueryOptions, fetch: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DashboardResult<T>> + Send + 'static,
    {
        let fetcher: Fetcher<A, T> =
            Arc::new(move |args| -> BoxFuture<'static, DashboardResult<T>> {
                Box::pin(fetch(args))
            });
        let (state, _) = watch::channel(QueryState::default());
        Self {
            name: name.into(),
            fetcher,
            options,
            cache: QueryCache::new(),
            state,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Current state snapshot
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Wait until no call is loading and return the resulting state
    pub async fn settled(&self) -> QueryState<T> {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|state| !state.loading).await;
        match settled {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Drop every cached value
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    /// Whether a call is running or a cached value is still fresh.
    ///
    /// Expired cache entries are dropped as a side effect.
    pub fn is_active(&self) -> bool {
        if self.in_flight.lock().handle.is_some() {
            return true;
        }
        self.options.enable_cache && self.cache.purge_expired(self.options.cache_time) > 0
    }

    /// Run the operation, serving a fresh cached value when there is one
    pub async fn execute(&self, args: A) -> DashboardResult<T> {
        self.run(args, false).await
    }

    /// Run the operation, bypassing the cache read
    pub async fn refresh(&self, args: A) -> DashboardResult<T> {
        self.run(args, true).await
    }

    #[instrument(skip(self, args), fields(query = %self.name))]
    async fn run(&self, args: A, bypass_cache: bool) -> DashboardResult<T> {
        let key = if self.options.enable_cache {
            Some(cache_key(&self.name, &args)?)
        } else {
            None
        };

        let generation = self.supersede_previous();

        if let (Some(key), false) = (&key, bypass_cache) {
            if let Some(hit) = self.cache.get(key, self.options.cache_time) {
                debug!("Cache hit for {}", key);
                let guard = self.in_flight.lock();
                if guard.generation != generation {
                    return Err(DashboardError::Superseded);
                }
                self.state.send_modify(|state| {
                    state.data = Some(hit.data.clone());
                    state.loading = false;
                    state.error = None;
                    state.last_updated = Some(hit.updated_at);
                });
                return Ok(hit.data);
            }
        }

        let task = {
            let mut guard = self.in_flight.lock();
            if guard.generation != generation {
                return Err(DashboardError::Superseded);
            }
            self.state.send_modify(|state| {
                state.loading = true;
                state.error = None;
            });
            let task = tokio::spawn(fetch_with_retry(
                self.name.clone(),
                Arc::clone(&self.fetcher),
                args,
                self.options.retry_count,
                self.options.retry_delay,
            ));
            guard.handle = Some(task.abort_handle());
            task
        };
        let mut call = CallGuard {
            handle: task.abort_handle(),
            generation,
            in_flight: &self.in_flight,
            state: &self.state,
            armed: true,
        };

        let outcome = task.await;
        call.armed = false;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => return Err(DashboardError::Superseded),
            Err(e) => Err(DashboardError::request(format!("Query task failed: {}", e))),
        };

        // Checking the generation and applying the result happen under one
        // lock so a newer call cannot interleave between them
        let mut guard = self.in_flight.lock();
        if guard.generation != generation {
            debug!("Discarding superseded result");
            return Err(DashboardError::Superseded);
        }
        guard.handle = None;

        match outcome {
            Ok(data) => {
                let updated_at = match key {
                    Some(key) => self.cache.insert(key, data.clone()),
                    None => Utc::now(),
                };
                self.state.send_modify(|state| {
                    state.data = Some(data.clone());
                    state.loading = false;
                    state.error = None;
                    state.last_updated = Some(updated_at);
                });
                Ok(data)
            }
            Err(e) => {
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    /// Claim a new generation and abort whatever call held the previous one
    fn supersede_previous(&self) -> u64 {
        let mut guard = self.in_flight.lock();
        guard.generation += 1;
        if let Some(handle) = guard.handle.take() {
            debug!("Aborting in-flight {} call", self.name);
            handle.abort();
        }
        guard.generation
    }
}

/// Attempt the fetch up to `retry_count` times with linear backoff.
///
/// Validation failures are returned immediately.
async fn fetch_with_retry<A, T>(
    name: String,
    fetcher: Fetcher<A, T>,
    args: A,
    retry_count: u32,
    retry_delay: Duration,
) -> DashboardResult<T>
where
    A: Clone,
{
    let attempts = retry_count.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match fetcher(args.clone()).await {
            Ok(data) => return Ok(data),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= attempts => {
                error!("{} failed after {} attempts: {}", name, attempts, e);
                return Err(e);
            }
            Err(e) => {
                warn!("{} attempt {}/{} failed: {}", name, attempt, attempts, e);
                tokio::time::sleep(retry_delay * attempt).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    /// A query that counts calls and echoes its argument
    fn echo_query(calls: Arc<AtomicU32>, options: QueryOptions) -> Query<String, String> {
        Query::new("echo", options, move |ticker: String| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("data for {}", ticker))
            }
        })
    }

    #[test]
    fn test_option_presets() {
        let defaults = QueryOptions::default();
        assert!(defaults.enable_cache);
        assert_eq!(defaults.cache_time, Duration::from_secs(300));
        assert_eq!(defaults.retry_count, 3);
        assert_eq!(defaults.retry_delay, Duration::from_secs(1));

        assert_eq!(QueryOptions::price().cache_time, Duration::from_secs(120));
        assert_eq!(QueryOptions::fundamental().cache_time, Duration::from_secs(3600));
        assert_eq!(QueryOptions::social().cache_time, Duration::from_secs(900));
        assert_eq!(QueryOptions::complete_analysis().retry_count, 2);
        assert!(!QueryOptions::ml().without_cache().enable_cache);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_window_limits_network_calls() {
        let calls = counter();
        let query = echo_query(
            Arc::clone(&calls),
            QueryOptions::default().with_cache_time(Duration::from_secs(60)),
        );

        query.execute("TCS.NS".to_string()).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = query.execute("TCS.NS".to_string()).await.unwrap();
        assert_eq!(second, "data for TCS.NS");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        query.execute("TCS.NS".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_goes_inactive_once_cache_expires() {
        let query = echo_query(
            counter(),
            QueryOptions::default().with_cache_time(Duration::from_secs(60)),
        );
        assert!(!query.is_active());

        query.execute("TCS.NS".to_string()).await.unwrap();
        assert!(query.is_active());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!query.is_active());
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_arguments() {
        let calls = counter();
        let query = echo_query(Arc::clone(&calls), QueryOptions::default());

        query.execute("TCS.NS".to_string()).await.unwrap();
        query.execute("INFY.NS".to_string()).await.unwrap();
        query.execute("TCS.NS".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_and_disabled_cache_always_fetch() {
        let calls = counter();
        let query = echo_query(Arc::clone(&calls), QueryOptions::default());
        query.execute("TCS.NS".to_string()).await.unwrap();
        query.refresh("TCS.NS".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let calls = counter();
        let query = echo_query(Arc::clone(&calls), QueryOptions::default().without_cache());
        query.execute("TCS.NS".to_string()).await.unwrap();
        query.execute("TCS.NS".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_last_attempt() {
        let calls = counter();
        let counted = Arc::clone(&calls);
        let query: Query<(), u32> = Query::new(
            "flaky",
            QueryOptions::default().with_retry(3, Duration::from_secs(1)),
            move |_| {
                let calls = Arc::clone(&counted);
                async move {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt < 3 {
                        Err(DashboardError::request("HTTP 503: Service Unavailable"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
        );

        let started = tokio::time::Instant::now();
        assert_eq!(query.execute(()).await.unwrap(), 3);
        // Linear backoff: 1s after the first failure, 2s after the second
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));

        let state = query.state();
        assert_eq!(state.data, Some(3));
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(state.last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_error() {
        let calls = counter();
        let counted = Arc::clone(&calls);
        let query: Query<(), u32> = Query::new(
            "down",
            QueryOptions::default().with_retry(2, Duration::from_millis(10)),
            move |_| {
                let calls = Arc::clone(&counted);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DashboardError::timeout("Request timed out after 10000ms"))
                }
            },
        );

        let err = query.execute(()).await.unwrap_err();
        assert_eq!(err, DashboardError::timeout("Request timed out after 10000ms"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let state = query.state();
        assert!(!state.loading);
        assert_eq!(state.error, Some(err));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_are_not_retried() {
        let calls = counter();
        let counted = Arc::clone(&calls);
        let query: Query<(), u32> = Query::new("invalid", QueryOptions::default(), move |_| {
            let calls = Arc::clone(&counted);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DashboardError::validation("Ticker must not be empty"))
            }
        });

        assert!(query.execute(()).await.unwrap_err().is_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_call_wins_regardless_of_arrival_order() {
        // The first call is slower than the second
        let query: Arc<Query<(String, u64), String>> = Arc::new(Query::new(
            "delayed",
            QueryOptions::default().without_cache(),
            |(label, delay_ms): (String, u64)| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(label)
            },
        ));

        let first = tokio::spawn({
            let query = Arc::clone(&query);
            async move { query.execute(("first".to_string(), 500)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = query.execute(("second".to_string(), 50)).await;

        assert_eq!(second.unwrap(), "second");
        assert_eq!(first.await.unwrap(), Err(DashboardError::Superseded));

        // Let the first call's original deadline pass
        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = query.state();
        assert_eq!(state.data.as_deref(), Some("second"));
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_call_does_not_populate_cache() {
        let calls = counter();
        let counted = Arc::clone(&calls);
        let query: Arc<Query<String, String>> = Arc::new(Query::new(
            "slow",
            QueryOptions::default(),
            move |ticker: String| {
                let calls = Arc::clone(&counted);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(ticker)
                }
            },
        ));

        let first = tokio::spawn({
            let query = Arc::clone(&query);
            async move { query.execute("TCS.NS".to_string()).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        query.execute("INFY.NS".to_string()).await.unwrap();
        assert_eq!(first.await.unwrap(), Err(DashboardError::Superseded));

        // TCS.NS was never cached, so it is fetched again
        query.execute("TCS.NS".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_settled_waits_for_loading_to_clear() {
        let query: Arc<Query<(), u32>> = Arc::new(Query::new(
            "settle",
            QueryOptions::default(),
            |_| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(7)
            },
        ));

        let running = tokio::spawn({
            let query = Arc::clone(&query);
            async move { query.execute(()).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(query.state().loading);

        let state = query.settled().await;
        assert_eq!(state.data, Some(7));
        assert!(!state.loading);
        assert_eq!(running.await.unwrap(), Ok(7));
    }
}
