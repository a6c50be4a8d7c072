//! Service client
//!
//! One method per remote operation across the seven backend services.
//! Inputs are validated before any request is made; everything after that
//! is reported through [`ApiResponse`].

use std::sync::Arc;
use std::time::Duration;

use dashboard_core::{
    ApiResponse, DashboardConfig, DashboardError, DashboardResult, EndpointRegistry,
    HealthRecord, Service, Signal, Subsystem, SystemHealth,
};
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::executor::{RequestExecutor, RequestOptions};
use crate::mock::mock_payload;

/// Default number of days of price history
pub const DEFAULT_HISTORY_DAYS: u32 = 30;
/// Default number of news articles
pub const DEFAULT_ARTICLE_LIMIT: u32 = 10;
/// Default number of latest predictions
pub const DEFAULT_PREDICTION_LIMIT: u32 = 20;
/// Default lookback for ML performance evaluation
pub const DEFAULT_EVALUATION_DAYS: u32 = 7;

/// Uppercase and validate a ticker symbol
pub fn normalize_ticker(ticker: &str) -> DashboardResult<String> {
    let trimmed = ticker.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::validation("ticker must not be empty"));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '&' | '_' | '=')))
    {
        return Err(DashboardError::validation(format!(
            "invalid character '{}' in ticker '{}'",
            bad, trimmed
        )));
    }
    Ok(trimmed.to_uppercase())
}

/// Reject negative or non-finite confidence thresholds
pub fn validate_min_confidence(min_confidence: f64) -> DashboardResult<()> {
    if !min_confidence.is_finite() || min_confidence < 0.0 {
        return Err(DashboardError::validation(format!(
            "min_confidence must be a non-negative number, got {}",
            min_confidence
        )));
    }
    Ok(())
}

/// Query string builder that only keeps present parameters
#[derive(Debug, Default)]
struct QueryParams(Vec<(&'static str, String)>);

impl QueryParams {
    fn new() -> Self {
        Self::default()
    }

    fn ticker(ticker: &str) -> Self {
        Self::new().with("ticker", ticker)
    }

    fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    fn with_opt<T: ToString>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Adds `key=true` only when set
    fn flag(self, key: &'static str, set: bool) -> Self {
        if set {
            self.with(key, "true")
        } else {
            self
        }
    }
}

/// Result of a health check for one service or for all of them
#[derive(Debug, Clone)]
pub enum HealthReport {
    Single {
        service: Service,
        response: ApiResponse,
    },
    All(SystemHealth),
}

/// Client for the dashboard's backend services
#[derive(Clone)]
pub struct ServiceClient {
    executor: RequestExecutor,
    endpoints: Arc<EndpointRegistry>,
    /// Simulated latency when serving demo payloads; `None` outside mock mode
    mock_delay: Option<Duration>,
}

impl ServiceClient {
    /// Create a client from the process configuration
    pub fn new(config: &DashboardConfig) -> Self {
        let executor = RequestExecutor::new(config.request_timeout).verbose(config.debug);
        let mut client = Self::with_executor(executor, config.endpoints.clone());
        if config.use_mock_data {
            info!("Mock mode enabled; per-ticker data will not hit the network");
            client.mock_delay = Some(config.mock_delay);
        }
        client
    }

    /// Create a client from an explicit executor and endpoint registry
    pub fn with_executor(executor: RequestExecutor, endpoints: EndpointRegistry) -> Self {
        Self {
            executor,
            endpoints: Arc::new(endpoints),
            mock_delay: None,
        }
    }

    /// Serve demo payloads after the given delay instead of calling the data services
    pub fn with_mock_data(mut self, delay: Duration) -> Self {
        self.mock_delay = Some(delay);
        self
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    pub fn is_mock(&self) -> bool {
        self.mock_delay.is_some()
    }

    fn build_url(&self, service: Service, path: &str, params: QueryParams) -> String {
        let raw = self.endpoints.url(service, path);
        if params.0.is_empty() {
            return raw;
        }

        match Url::parse(&raw) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(params.0.iter());
                url.to_string()
            }
            Err(e) => {
                // Registry URLs are validated at construction
                warn!("Unparseable endpoint URL {}: {}", raw, e);
                raw
            }
        }
    }

    async fn get(&self, service: Service, path: &str, params: QueryParams) -> ApiResponse {
        let url = self.build_url(service, path, params);
        self.executor.execute(&url, RequestOptions::get()).await
    }

    async fn post(&self, service: Service, path: &str, params: QueryParams) -> ApiResponse {
        let url = self.build_url(service, path, params);
        self.executor.execute(&url, RequestOptions::post()).await
    }

    /// Demo payload for a per-ticker subsystem, if mock mode is on
    async fn mock(&self, subsystem: Subsystem, ticker: &str) -> Option<ApiResponse> {
        let delay = self.mock_delay?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        debug!("Serving mock {} data for {}", subsystem.as_str(), ticker);
        Some(ApiResponse::mock(mock_payload(subsystem, ticker)))
    }

    /// Fetch one per-ticker subsystem the way the complete analysis does
    pub async fn get_subsystem(
        &self,
        subsystem: Subsystem,
        ticker: &str,
    ) -> DashboardResult<ApiResponse> {
        match subsystem {
            Subsystem::Price => self.get_price_data(ticker, false).await,
            Subsystem::Technical => self.get_technical_analysis(ticker, false).await,
            Subsystem::Fundamental => self.get_fundamental_data(ticker, false).await,
            Subsystem::News => self.get_news_sentiment(ticker, false).await,
            Subsystem::Social => self.get_social_sentiment(ticker, false).await,
            Subsystem::Ml => self.get_ml_prediction(ticker).await,
        }
    }

    // ========================================================================
    // Price Service
    // ========================================================================

    /// Latest quote
    #[instrument(skip(self))]
    pub async fn get_price_data(&self, ticker: &str, force: bool) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(mock) = self.mock(Subsystem::Price, &ticker).await {
            return Ok(mock);
        }
        let params = QueryParams::ticker(&ticker).flag("force", force);
        Ok(self.get(Service::Price, "/price-data", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_price_history(&self, ticker: &str, days: u32) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        let params = QueryParams::ticker(&ticker).with("days", days);
        Ok(self.get(Service::Price, "/price-history", params).await)
    }

    #[instrument(skip(self))]
    pub async fn update_all_prices(&self) -> ApiResponse {
        self.post(Service::Price, "/batch-update-prices", QueryParams::new())
            .await
    }

    // ========================================================================
    // Technical Service
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_technical_analysis(
        &self,
        ticker: &str,
        force: bool,
    ) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(mock) = self.mock(Subsystem::Technical, &ticker).await {
            return Ok(mock);
        }
        let params = QueryParams::ticker(&ticker).flag("force", force);
        Ok(self.get(Service::Technical, "/technical-analysis", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_technical_indicators(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Technical, "/technical-indicators", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn get_trading_signals(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Technical, "/trading-signals", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn update_all_technical(&self) -> ApiResponse {
        self.post(Service::Technical, "/batch-update-technical", QueryParams::new())
            .await
    }

    // ========================================================================
    // Fundamental Service
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_fundamental_data(
        &self,
        ticker: &str,
        force: bool,
    ) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(mock) = self.mock(Subsystem::Fundamental, &ticker).await {
            return Ok(mock);
        }
        let params = QueryParams::ticker(&ticker).flag("force", force);
        Ok(self.get(Service::Fundamental, "/fundamental-data", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_financial_ratios(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Fundamental, "/financial-ratios", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn get_company_profile(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Fundamental, "/company-profile", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn update_all_fundamental(&self) -> ApiResponse {
        self.post(Service::Fundamental, "/batch-update-fundamental", QueryParams::new())
            .await
    }

    // ========================================================================
    // News Sentiment Service
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_news_sentiment(
        &self,
        ticker: &str,
        force: bool,
    ) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(mock) = self.mock(Subsystem::News, &ticker).await {
            return Ok(mock);
        }
        let params = QueryParams::ticker(&ticker).flag("force", force);
        Ok(self.get(Service::News, "/enhanced-news-sentiment", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_news_articles(&self, ticker: &str, limit: u32) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        let params = QueryParams::ticker(&ticker).with("limit", limit);
        Ok(self.get(Service::News, "/news-articles", params).await)
    }

    #[instrument(skip(self))]
    pub async fn update_all_news(&self) -> ApiResponse {
        self.post(Service::News, "/batch-update-news", QueryParams::new())
            .await
    }

    // ========================================================================
    // Social Sentiment Service
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_social_sentiment(
        &self,
        ticker: &str,
        force: bool,
    ) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(mock) = self.mock(Subsystem::Social, &ticker).await {
            return Ok(mock);
        }
        let params = QueryParams::ticker(&ticker).flag("force", force);
        Ok(self.get(Service::Social, "/social-sentiment", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_reddit_sentiment(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Social, "/reddit-sentiment", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn get_twitter_sentiment(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Social, "/twitter-sentiment", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn update_all_social(&self) -> ApiResponse {
        self.post(Service::Social, "/batch-update-social", QueryParams::new())
            .await
    }

    // ========================================================================
    // Orchestrator Service
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_comprehensive_data(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Orchestrator, "/comprehensive-data", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn orchestrate_ticker(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self
            .get(Service::Orchestrator, "/ml-orchestrator", QueryParams::ticker(&ticker))
            .await)
    }

    #[instrument(skip(self))]
    pub async fn orchestrate_all(&self) -> ApiResponse {
        let params = QueryParams::new().flag("all", true);
        self.get(Service::Orchestrator, "/ml-orchestrator", params)
            .await
    }

    #[instrument(skip(self))]
    pub async fn generate_recommendations(&self) -> ApiResponse {
        let params = QueryParams::new()
            .flag("all", true)
            .flag("recommendations", true);
        self.get(Service::Orchestrator, "/ml-orchestrator", params)
            .await
    }

    // ========================================================================
    // ML Service
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_ml_prediction(&self, ticker: &str) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(mock) = self.mock(Subsystem::Ml, &ticker).await {
            return Ok(mock);
        }
        Ok(self
            .get(Service::Ml, "/enhanced-predict", QueryParams::ticker(&ticker))
            .await)
    }

    /// Most recent predictions, optionally filtered by signal and minimum confidence
    #[instrument(skip(self))]
    pub async fn get_latest_predictions(
        &self,
        limit: u32,
        signal: Option<Signal>,
        min_confidence: f64,
    ) -> DashboardResult<ApiResponse> {
        validate_min_confidence(min_confidence)?;

        let params = QueryParams::new()
            .with("limit", limit)
            .with_opt("signal", signal.map(|s| s.as_str()))
            .with_opt("min_confidence", (min_confidence > 0.0).then_some(min_confidence));
        Ok(self.get(Service::Ml, "/latest-predictions", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_prediction_history(
        &self,
        ticker: &str,
        days_back: u32,
        include_accuracy: bool,
    ) -> DashboardResult<ApiResponse> {
        let ticker = normalize_ticker(ticker)?;
        let params = QueryParams::ticker(&ticker)
            .with("days_back", days_back)
            .with("include_accuracy", include_accuracy);
        Ok(self.get(Service::Ml, "/prediction-history", params).await)
    }

    #[instrument(skip(self))]
    pub async fn get_performance_dashboard(&self) -> ApiResponse {
        self.get(Service::Ml, "/performance-dashboard", QueryParams::new())
            .await
    }

    /// Kick off model training. A zero lookback is treated as unset.
    #[instrument(skip(self))]
    pub async fn train_models(&self, days_back: Option<u32>, force: bool) -> ApiResponse {
        let params = QueryParams::new()
            .with_opt("days_back", days_back.filter(|d| *d > 0))
            .flag("force", force);
        self.post(Service::Ml, "/train-enhanced-models", params)
            .await
    }

    #[instrument(skip(self))]
    pub async fn evaluate_ml_performance(&self, days_back: u32) -> ApiResponse {
        let params = QueryParams::new().with("days_back", days_back);
        self.get(Service::Ml, "/evaluate-performance", params)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_batch_predictions(&self) -> ApiResponse {
        let params = QueryParams::new().flag("batch", true);
        self.get(Service::Ml, "/enhanced-predict", params).await
    }

    #[instrument(skip(self))]
    pub async fn check_ml_dependencies(&self) -> ApiResponse {
        self.get(Service::Ml, "/check-dependencies", QueryParams::new())
            .await
    }

    // ========================================================================
    // Health Checks
    // ========================================================================

    /// Probe one service's health endpoint
    #[instrument(skip(self))]
    pub async fn check_health(&self, service: Service) -> ApiResponse {
        self.get(service, service.health_path(), QueryParams::new())
            .await
    }

    /// Probe every service, one after another, and reduce to an overall status.
    ///
    /// A failed probe becomes that service's `error` record; the loop always
    /// runs to the end.
    #[instrument(skip(self))]
    pub async fn check_all_services_health(&self) -> SystemHealth {
        let mut records = IndexMap::with_capacity(Service::ALL.len());

        for service in Service::ALL {
            let response = self.check_health(service).await;
            if let Some(error) = response.error_message() {
                warn!("Health check failed for {} service: {}", service, error);
            }
            records.insert(service, HealthRecord::from_response(&response));
        }

        let health = SystemHealth::from_records(records);
        info!("Health check complete: overall {:?}", health.overall);
        health
    }

    /// Check one named service, or every service when `service` is `None`.
    ///
    /// An unknown service name is rejected before any request is made.
    pub async fn check_service_health(
        &self,
        service: Option<&str>,
    ) -> DashboardResult<HealthReport> {
        match service {
            Some(name) => {
                let service: Service = name.parse()?;
                let response = self.check_health(service).await;
                Ok(HealthReport::Single { service, response })
            }
            None => Ok(HealthReport::All(self.check_all_services_health().await)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ServiceClient {
        let endpoints = EndpointRegistry::new(Service::ALL.iter().map(|s| {
            (*s, format!("https://{}.example.com/api", s))
        }))
        .unwrap();
        ServiceClient::with_executor(RequestExecutor::new(Duration::from_secs(1)), endpoints)
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker(" reliance.ns ").unwrap(), "RELIANCE.NS");
        assert_eq!(normalize_ticker("m&m.ns").unwrap(), "M&M.NS");
        assert!(normalize_ticker("   ").unwrap_err().is_validation());
        assert!(normalize_ticker("TCS NS").unwrap_err().is_validation());
    }

    #[test]
    fn test_build_url_encodes_present_params_only() {
        let client = client();

        let url = client.build_url(
            Service::Price,
            "/price-data",
            QueryParams::ticker("M&M.NS").flag("force", false),
        );
        assert_eq!(url, "https://price.example.com/api/price-data?ticker=M%26M.NS");

        let url = client.build_url(
            Service::Ml,
            "/latest-predictions",
            QueryParams::new()
                .with("limit", 20)
                .with_opt::<&str>("signal", None)
                .with_opt("min_confidence", Some(0.7)),
        );
        assert_eq!(
            url,
            "https://ml.example.com/api/latest-predictions?limit=20&min_confidence=0.7"
        );

        let url = client.build_url(Service::Ml, "/performance-dashboard", QueryParams::new());
        assert_eq!(url, "https://ml.example.com/api/performance-dashboard");
    }

    #[tokio::test]
    async fn test_validation_happens_before_request() {
        // Endpoints point at hosts that do not resolve; validation must fail first
        let client = client();

        let err = client.get_price_data("", false).await.unwrap_err();
        assert!(matches!(err, DashboardError::Validation(_)));

        let err = client
            .get_latest_predictions(20, None, -0.5)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Validation(_)));

        let err = client.check_service_health(Some("crypto")).await.unwrap_err();
        assert_eq!(err, DashboardError::UnknownService("crypto".to_string()));
    }

    #[tokio::test]
    async fn test_mock_mode_skips_network() {
        let client = client().with_mock_data(Duration::ZERO);

        let response = client.get_price_data("tcs.ns", false).await.unwrap();
        match response {
            ApiResponse::Success { data, is_mock, .. } => {
                assert!(is_mock);
                assert_eq!(data["ticker"], "TCS.NS");
            }
            other => panic!("expected mock success, got {:?}", other),
        }
    }
}
