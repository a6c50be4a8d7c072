//! Shared application state

use std::hash::Hash;
use std::sync::Arc;

use dashboard_client::ServiceClient;
use dashboard_core::{CompleteAnalysis, DashboardConfig, DashboardError, Signal, Subsystem};
use dashboard_services::{
    cache_key, queries, AnalysisAggregator, BatchTracker, HealthMonitor, Query, QueryOptions,
};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub client: ServiceClient,
    pub aggregator: Arc<AnalysisAggregator>,
    pub health: Arc<HealthMonitor>,
    pub batch: Arc<BatchTracker>,
    pub queries: Arc<QueryRegistry>,
}

impl AppState {
    pub fn new(config: &DashboardConfig) -> Self {
        let client = ServiceClient::new(config);
        let aggregator = Arc::new(AnalysisAggregator::new(client.clone()));

        Self {
            health: Arc::new(HealthMonitor::new(client.clone())),
            batch: Arc::new(BatchTracker::new(Arc::clone(&aggregator))),
            queries: Arc::new(QueryRegistry::new(client.clone(), Arc::clone(&aggregator))),
            client,
            aggregator,
        }
    }
}

pub type LatestPredictionsArgs = (u32, Option<Signal>, f64);
pub type PredictionHistoryArgs = (String, u32, bool);

/// Most queries of one kind held at once
pub const DEFAULT_QUERY_CAPACITY: usize = 1024;

/// Cached queries, one instance per distinct request so concurrent
/// requests for different arguments never supersede each other.
///
/// Each map holds at most `capacity` queries. When a map is full, idle
/// queries with expired caches are evicted first, then every idle query.
/// A request that still finds no room runs on a query that is not kept.
pub struct QueryRegistry {
    client: ServiceClient,
    aggregator: Arc<AnalysisAggregator>,
    capacity: usize,
    analysis: DashMap<String, Arc<Query<String, CompleteAnalysis>>>,
    subsystems: DashMap<(Subsystem, String), Arc<Query<String, Value>>>,
    latest_predictions: DashMap<String, Arc<Query<LatestPredictionsArgs, Value>>>,
    prediction_history: DashMap<String, Arc<Query<PredictionHistoryArgs, Value>>>,
    ml_performance: Arc<Query<(), Value>>,
}

impl QueryRegistry {
    pub fn new(client: ServiceClient, aggregator: Arc<AnalysisAggregator>) -> Self {
        Self::with_capacity(client, aggregator, DEFAULT_QUERY_CAPACITY)
    }

    pub fn with_capacity(
        client: ServiceClient,
        aggregator: Arc<AnalysisAggregator>,
        capacity: usize,
    ) -> Self {
        Self {
            ml_performance: Arc::new(queries::ml_performance(
                client.clone(),
                QueryOptions::ml_performance(),
            )),
            client,
            aggregator,
            capacity: capacity.max(1),
            analysis: DashMap::new(),
            subsystems: DashMap::new(),
            latest_predictions: DashMap::new(),
            prediction_history: DashMap::new(),
        }
    }

    /// Complete-analysis query for a normalized ticker
    pub fn analysis(&self, ticker: &str) -> Arc<Query<String, CompleteAnalysis>> {
        self.register(&self.analysis, ticker.to_string(), || {
            queries::complete_analysis(
                Arc::clone(&self.aggregator),
                QueryOptions::complete_analysis(),
            )
        })
    }

    /// Single-subsystem query for a normalized ticker
    pub fn subsystem(&self, subsystem: Subsystem, ticker: &str) -> Arc<Query<String, Value>> {
        self.register(&self.subsystems, (subsystem, ticker.to_string()), || {
            queries::subsystem(
                self.client.clone(),
                subsystem,
                queries::subsystem_options(subsystem),
            )
        })
    }

    pub fn latest_predictions(
        &self,
        args: &LatestPredictionsArgs,
    ) -> Result<Arc<Query<LatestPredictionsArgs, Value>>, ApiError> {
        let key = cache_key("latest_predictions", args)?;
        Ok(self.register(&self.latest_predictions, key, || {
            queries::latest_predictions(self.client.clone(), QueryOptions::latest_predictions())
        }))
    }

    pub fn prediction_history(
        &self,
        args: &PredictionHistoryArgs,
    ) -> Result<Arc<Query<PredictionHistoryArgs, Value>>, ApiError> {
        let key = cache_key("prediction_history", args)?;
        Ok(self.register(&self.prediction_history, key, || {
            queries::prediction_history(self.client.clone(), QueryOptions::prediction_history())
        }))
    }

    pub fn ml_performance(&self) -> Arc<Query<(), Value>> {
        Arc::clone(&self.ml_performance)
    }

    /// Number of per-request queries currently held
    pub fn len(&self) -> usize {
        self.analysis.len()
            + self.subsystems.len()
            + self.latest_predictions.len()
            + self.prediction_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register<K, A, T, F>(
        &self,
        map: &DashMap<K, Arc<Query<A, T>>>,
        key: K,
        make: F,
    ) -> Arc<Query<A, T>>
    where
        K: Eq + Hash,
        A: Serialize + Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Query<A, T>,
    {
        if let Some(query) = map.get(&key) {
            return Arc::clone(query.value());
        }

        if map.len() >= self.capacity {
            evict_idle(map, self.capacity);
        }
        if map.len() >= self.capacity {
            warn!("Query registry full, serving request on an unshared query");
            return Arc::new(make());
        }

        Arc::clone(map.entry(key).or_insert_with(|| Arc::new(make())).value())
    }
}

/// Drop queries no handler holds: expired ones first, then any if still full
fn evict_idle<K, A, T>(map: &DashMap<K, Arc<Query<A, T>>>, capacity: usize)
where
    K: Eq + Hash,
    A: Serialize + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let before = map.len();
    map.retain(|_, query| Arc::strong_count(query) > 1 || query.is_active());
    if map.len() >= capacity {
        map.retain(|_, query| Arc::strong_count(query) > 1);
    }
    debug!("Evicted {} idle queries", before - map.len());
}

/// Run a query for a handler.
///
/// A call superseded by a concurrent request for the same query waits for
/// the newer call and answers with its outcome.
pub async fn run_query<A, T>(query: &Query<A, T>, args: A, refresh: bool) -> Result<T, ApiError>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let result = if refresh {
        query.refresh(args).await
    } else {
        query.execute(args).await
    };

    match result {
        Err(DashboardError::Superseded) => {
            let state = query.settled().await;
            match (state.error, state.data) {
                (Some(error), _) => Err(error.into()),
                (None, Some(data)) => Ok(data),
                (None, None) => Err(DashboardError::Superseded.into()),
            }
        }
        other => other.map_err(ApiError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use dashboard_client::RequestExecutor;
    use dashboard_core::EndpointRegistry;
    use std::time::Duration;

    fn mock_client() -> ServiceClient {
        ServiceClient::with_executor(
            RequestExecutor::new(Duration::from_secs(1)),
            EndpointRegistry::uniform("http://127.0.0.1:9/api").unwrap(),
        )
        .with_mock_data(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_registry_stays_within_capacity() {
        let client = mock_client();
        let aggregator = Arc::new(AnalysisAggregator::new(client.clone()));
        let registry = QueryRegistry::with_capacity(client, aggregator, 4);

        for n in 0..50 {
            let ticker = format!("TICK{}.NS", n);
            let query = registry.analysis(&ticker);
            let analysis = run_query(&query, ticker.clone(), false).await.unwrap();
            assert_eq!(analysis.data.ticker, ticker);
            assert!(registry.analysis.len() <= 4);
        }

        // A query still held by a handler survives eviction
        let held = registry.analysis("HELD.NS");
        for n in 0..10 {
            registry.analysis(&format!("OTHER{}.NS", n));
        }
        assert!(registry.analysis.contains_key("HELD.NS"));
        assert!(Arc::ptr_eq(&held, &registry.analysis("HELD.NS")));
        assert!(registry.len() <= 4);
    }

    #[tokio::test]
    async fn test_same_request_shares_one_query() {
        let client = mock_client();
        let aggregator = Arc::new(AnalysisAggregator::new(client.clone()));
        let registry = QueryRegistry::new(client, aggregator);

        let first = registry.subsystem(Subsystem::Price, "TCS.NS");
        let second = registry.subsystem(Subsystem::Price, "TCS.NS");
        assert!(Arc::ptr_eq(&first, &second));

        registry.subsystem(Subsystem::Ml, "TCS.NS");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_superseded_call_reports_winner_status() {
        let query: Query<u32, u32> = Query::new(
            "status",
            QueryOptions::default().without_cache(),
            |n: u32| async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(0)
                } else {
                    Err(DashboardError::validation("n must be zero"))
                }
            },
        );

        let (first, second) = tokio::join!(
            run_query(&query, 0, false),
            run_query(&query, 1, false)
        );

        assert_eq!(second.unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(first.unwrap_err().status, StatusCode::BAD_REQUEST);
    }
}
