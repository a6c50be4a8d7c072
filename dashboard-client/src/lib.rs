//! HTTP integration with the dashboard's backend services
//!
//! This crate provides the request executor that normalizes every upstream
//! call into an [`ApiResponse`](dashboard_core::ApiResponse), and the service
//! client with one method per remote operation.

pub mod client;
pub mod executor;
pub mod mock;

pub use client::{
    normalize_ticker, validate_min_confidence, HealthReport, ServiceClient,
    DEFAULT_ARTICLE_LIMIT, DEFAULT_EVALUATION_DAYS, DEFAULT_HISTORY_DAYS,
    DEFAULT_PREDICTION_LIMIT,
};
pub use executor::{RequestExecutor, RequestOptions};
pub use mock::mock_payload;
