//! Analysis Aggregator
//!
//! Fans out to every per-ticker subsystem concurrently and collects each
//! outcome independently. One slow or failing subsystem never blocks or
//! fails the others.

use chrono::Utc;
use dashboard_client::{normalize_ticker, ServiceClient};
use dashboard_core::{
    ApiResponse, BatchOperation, BatchOperationRecord, CompleteAnalysis, DashboardResult,
    Subsystem,
};
use futures::future::join_all;
use tracing::{info, instrument, warn};

/// Combines per-service calls into aggregate results
#[derive(Clone)]
pub struct AnalysisAggregator {
    client: ServiceClient,
}

impl AnalysisAggregator {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Fetch all six subsystems for one ticker.
    ///
    /// Waits for every request to settle. The result is always successful;
    /// failed subsystems leave their data slot empty and record the error.
    #[instrument(skip(self))]
    pub async fn get_complete_analysis(&self, ticker: &str) -> DashboardResult<CompleteAnalysis> {
        let ticker = normalize_ticker(ticker)?;

        let responses = join_all(
            Subsystem::ALL
                .into_iter()
                .map(|subsystem| self.fetch_subsystem(subsystem, &ticker)),
        )
        .await;

        let mut analysis = CompleteAnalysis::new(ticker.as_str());
        for (subsystem, response) in Subsystem::ALL.into_iter().zip(responses) {
            if let Some(error) = response.error_message() {
                warn!("{} data unavailable for {}: {}", subsystem.as_str(), ticker, error);
            }
            analysis.record(subsystem, response);
        }

        let analysis = analysis.finish();
        info!(
            "Complete analysis for {}: {}/{} subsystems available",
            ticker,
            Subsystem::ALL.len() - analysis.failed_subsystems().len(),
            Subsystem::ALL.len()
        );
        Ok(analysis)
    }

    async fn fetch_subsystem(&self, subsystem: Subsystem, ticker: &str) -> ApiResponse {
        // The ticker is already normalized, so validation cannot fail here
        self.client
            .get_subsystem(subsystem, ticker)
            .await
            .unwrap_or_else(|e| ApiResponse::error(e.to_string()))
    }

    /// Trigger the batch update on every data service at once.
    ///
    /// Returns one settled record per service, in service order.
    #[instrument(skip(self))]
    pub async fn update_all_services(&self) -> Vec<BatchOperationRecord> {
        let started = Utc::now().timestamp_millis();
        let operations = [
            BatchOperation::UpdateAllPrices,
            BatchOperation::UpdateAllTechnical,
            BatchOperation::UpdateAllFundamental,
            BatchOperation::UpdateAllNews,
            BatchOperation::UpdateAllSocial,
        ];
        let mut records: Vec<BatchOperationRecord> = operations
            .iter()
            .map(|operation| {
                BatchOperationRecord::start(
                    format!("{}_{}", operation.name(), started),
                    operation.name(),
                )
            })
            .collect();

        let (price, technical, fundamental, news, social) = futures::join!(
            self.client.update_all_prices(),
            self.client.update_all_technical(),
            self.client.update_all_fundamental(),
            self.client.update_all_news(),
            self.client.update_all_social(),
        );

        for (record, response) in records
            .iter_mut()
            .zip([price, technical, fundamental, news, social])
        {
            if let Some(error) = response.error_message() {
                warn!("Batch update {} failed: {}", record.operation, error);
            }
            record.finish(&response);
        }

        records
    }
}
