//! Batch Operation Tracker
//!
//! Runs administrative batch operations and keeps a record of each one:
//! inserted as `running`, then settled as `completed` or `failed`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashboard_core::{ApiResponse, BatchOperation, BatchOperationRecord};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::aggregator::AnalysisAggregator;

/// Tracks batch operations in start order
pub struct BatchTracker {
    aggregator: Arc<AnalysisAggregator>,
    operations: RwLock<IndexMap<String, BatchOperationRecord>>,
    running: AtomicUsize,
}

/// Settles the record as failed if the operation is dropped before finishing
struct RunningGuard<'a> {
    tracker: &'a BatchTracker,
    id: String,
    settled: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            if let Some(record) = self.tracker.operations.write().get_mut(&self.id) {
                record.fail("Operation cancelled");
            }
        }
        self.tracker.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BatchTracker {
    pub fn new(aggregator: Arc<AnalysisAggregator>) -> Self {
        Self {
            aggregator,
            operations: RwLock::new(IndexMap::new()),
            running: AtomicUsize::new(0),
        }
    }

    /// Run one operation to completion and return its settled record
    #[instrument(skip(self))]
    pub async fn execute(&self, operation: BatchOperation) -> BatchOperationRecord {
        let id = self.start(operation);
        self.running.fetch_add(1, Ordering::SeqCst);
        let mut guard = RunningGuard {
            tracker: self,
            id: id.clone(),
            settled: false,
        };

        info!("Starting batch operation {}", id);
        let (response, result) = self.run(operation).await;

        let record = {
            let mut operations = self.operations.write();
            match operations.get_mut(&id) {
                Some(record) => {
                    record.finish(&response);
                    if let Some(result) = result {
                        record.result = Some(result);
                    }
                    record.clone()
                }
                // Cleared while running
                None => {
                    let mut record = BatchOperationRecord::start(id.clone(), operation.name());
                    record.finish(&response);
                    record
                }
            }
        };
        guard.settled = true;

        match &record.error {
            Some(error) => warn!("Batch operation {} failed: {}", id, error),
            None => info!("Batch operation {} completed", id),
        }
        record
    }

    /// Insert a running record under a fresh id
    fn start(&self, operation: BatchOperation) -> String {
        let mut operations = self.operations.write();
        let base = format!("{}_{}", operation.name(), Utc::now().timestamp_millis());
        let mut id = base.clone();
        let mut suffix = 1;
        while operations.contains_key(&id) {
            id = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        operations.insert(
            id.clone(),
            BatchOperationRecord::start(id.clone(), operation.name()),
        );
        id
    }

    /// Dispatch to the client. The second element overrides the record's
    /// result payload.
    async fn run(&self, operation: BatchOperation) -> (ApiResponse, Option<serde_json::Value>) {
        let client = self.aggregator.client();
        let response = match operation {
            BatchOperation::UpdateAllPrices => client.update_all_prices().await,
            BatchOperation::UpdateAllTechnical => client.update_all_technical().await,
            BatchOperation::UpdateAllFundamental => client.update_all_fundamental().await,
            BatchOperation::UpdateAllNews => client.update_all_news().await,
            BatchOperation::UpdateAllSocial => client.update_all_social().await,
            BatchOperation::OrchestrateAll => client.orchestrate_all().await,
            BatchOperation::GenerateRecommendations => client.generate_recommendations().await,
            BatchOperation::TrainMlModels { days_back, force } => {
                client.train_models(days_back, force).await
            }
            BatchOperation::GetBatchPredictions => client.get_batch_predictions().await,
            BatchOperation::UpdateAllServices => {
                let results = self.aggregator.update_all_services().await;
                let failed: Vec<&str> = results
                    .iter()
                    .filter(|r| r.error.is_some())
                    .map(|r| r.operation.as_str())
                    .collect();
                let response = if failed.is_empty() {
                    ApiResponse::success(json!({ "results": results }), 200)
                } else {
                    ApiResponse::error(format!(
                        "{} of {} service updates failed: {}",
                        failed.len(),
                        results.len(),
                        failed.join(", ")
                    ))
                };
                return (response, Some(json!({ "results": results })));
            }
        };
        (response, None)
    }

    /// All records, oldest first
    pub fn operations(&self) -> Vec<BatchOperationRecord> {
        self.operations.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<BatchOperationRecord> {
        self.operations.read().get(id).cloned()
    }

    /// Forget every record; operations still running are unaffected
    pub fn clear(&self) {
        self.operations.write().clear();
    }

    /// Whether any operation is running
    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::SeqCst) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_client::{RequestExecutor, ServiceClient};
    use dashboard_core::{BatchStatus, EndpointRegistry};
    use std::time::Duration;

    fn tracker() -> BatchTracker {
        let client = ServiceClient::with_executor(
            RequestExecutor::new(Duration::from_secs(1)),
            EndpointRegistry::uniform("http://127.0.0.1:9/api").unwrap(),
        );
        BatchTracker::new(Arc::new(AnalysisAggregator::new(client)))
    }

    #[tokio::test]
    async fn test_failed_operation_is_recorded() {
        let tracker = tracker();
        let record = tracker.execute(BatchOperation::UpdateAllPrices).await;

        assert_eq!(record.status, BatchStatus::Failed);
        assert_eq!(record.operation, "updateAllPrices");
        assert!(record.id.starts_with("updateAllPrices_"));
        assert!(record.end_time.is_some());
        assert!(record.error.is_some());
        assert_eq!(tracker.get(&record.id), Some(record));
        assert!(!tracker.is_busy());
    }

    #[tokio::test]
    async fn test_ids_stay_unique_and_clear_empties() {
        let tracker = tracker();
        let first = tracker.start(BatchOperation::OrchestrateAll);
        let second = tracker.start(BatchOperation::OrchestrateAll);
        assert_ne!(first, second);

        let ids: Vec<String> = tracker.operations().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second]);

        tracker.clear();
        assert!(tracker.operations().is_empty());
    }

    #[tokio::test]
    async fn test_update_all_services_collects_every_result() {
        let tracker = tracker();
        let record = tracker.execute(BatchOperation::UpdateAllServices).await;

        assert_eq!(record.status, BatchStatus::Failed);
        let results = record.result.as_ref().unwrap()["results"].as_array().unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0]["operation"], "updateAllPrices");
        assert_eq!(results[4]["operation"], "updateAllSocial");
        assert!(record.error.unwrap().starts_with("5 of 5 service updates failed"));
    }
}
