//! Long-running admin operations and their lifecycle records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DashboardError;
use crate::response::ApiResponse;

/// Lifecycle of a triggered batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

/// Admin operations that can be triggered from the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchOperation {
    UpdateAllPrices,
    UpdateAllTechnical,
    UpdateAllFundamental,
    UpdateAllNews,
    UpdateAllSocial,
    UpdateAllServices,
    OrchestrateAll,
    GenerateRecommendations,
    #[serde(rename = "trainMLModels")]
    TrainMlModels {
        days_back: Option<u32>,
        force: bool,
    },
    GetBatchPredictions,
}

impl BatchOperation {
    /// Identifier used in record ids and URLs
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::UpdateAllPrices => "updateAllPrices",
            BatchOperation::UpdateAllTechnical => "updateAllTechnical",
            BatchOperation::UpdateAllFundamental => "updateAllFundamental",
            BatchOperation::UpdateAllNews => "updateAllNews",
            BatchOperation::UpdateAllSocial => "updateAllSocial",
            BatchOperation::UpdateAllServices => "updateAllServices",
            BatchOperation::OrchestrateAll => "orchestrateAll",
            BatchOperation::GenerateRecommendations => "generateRecommendations",
            BatchOperation::TrainMlModels { .. } => "trainMLModels",
            BatchOperation::GetBatchPredictions => "getBatchPredictions",
        }
    }
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BatchOperation {
    type Err = DashboardError;

    /// Parse an operation name. `trainMLModels` parses with default arguments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "updateAllPrices" => Ok(BatchOperation::UpdateAllPrices),
            "updateAllTechnical" => Ok(BatchOperation::UpdateAllTechnical),
            "updateAllFundamental" => Ok(BatchOperation::UpdateAllFundamental),
            "updateAllNews" => Ok(BatchOperation::UpdateAllNews),
            "updateAllSocial" => Ok(BatchOperation::UpdateAllSocial),
            "updateAllServices" => Ok(BatchOperation::UpdateAllServices),
            "orchestrateAll" => Ok(BatchOperation::OrchestrateAll),
            "generateRecommendations" => Ok(BatchOperation::GenerateRecommendations),
            "trainMLModels" => Ok(BatchOperation::TrainMlModels {
                days_back: None,
                force: false,
            }),
            "getBatchPredictions" => Ok(BatchOperation::GetBatchPredictions),
            other => Err(DashboardError::validation(format!(
                "Unknown operation: {}",
                other
            ))),
        }
    }
}

/// One triggered batch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperationRecord {
    pub id: String,
    pub operation: String,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOperationRecord {
    /// New record in the `running` state
    pub fn start(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
            status: BatchStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            result: None,
            error: None,
        }
    }

    /// Settle the record from the operation's response
    pub fn finish(&mut self, response: &ApiResponse) {
        self.end_time = Some(Utc::now());
        match response {
            ApiResponse::Success { data, .. } => {
                self.status = BatchStatus::Completed;
                self.result = Some(data.clone());
            }
            ApiResponse::Failure { error, .. } => {
                self.status = BatchStatus::Failed;
                self.error = Some(error.clone());
            }
        }
    }

    /// Settle the record as failed without a response
    pub fn fail(&mut self, error: impl Into<String>) {
        self.end_time = Some(Utc::now());
        self.status = BatchStatus::Failed;
        self.error = Some(error.into());
    }

    pub fn is_running(&self) -> bool {
        self.status == BatchStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_operation_names() {
        assert_eq!(
            "updateAllPrices".parse::<BatchOperation>().unwrap(),
            BatchOperation::UpdateAllPrices
        );
        assert_eq!(
            "trainMLModels".parse::<BatchOperation>().unwrap(),
            BatchOperation::TrainMlModels {
                days_back: None,
                force: false
            }
        );
        let err = "dropTables".parse::<BatchOperation>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_record_lifecycle() {
        let mut record = BatchOperationRecord::start("updateAllNews_1", "updateAllNews");
        assert!(record.is_running());
        assert!(record.end_time.is_none());

        record.finish(&ApiResponse::success(json!({"updated": 20}), 200));
        assert_eq!(record.status, BatchStatus::Completed);
        assert_eq!(record.result, Some(json!({"updated": 20})));
        assert!(record.end_time.is_some());

        let mut failed = BatchOperationRecord::start("updateAllNews_2", "updateAllNews");
        failed.finish(&ApiResponse::error("HTTP 500: Internal Server Error"));
        assert_eq!(failed.status, BatchStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("HTTP 500: Internal Server Error"));
    }
}
