//! Core types for the stock dashboard
//!
//! This crate defines the shared data structures used across the dashboard,
//! including the service registry, normalized request results, health and
//! batch records, and the per-ticker analysis aggregate.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod health;
pub mod response;
pub mod service;
pub mod stock;

pub use analysis::{AnalysisData, CompleteAnalysis, SlotError, Slots, Subsystem};
pub use batch::{BatchOperation, BatchOperationRecord, BatchStatus};
pub use config::{DashboardConfig, EndpointRegistry};
pub use error::{DashboardError, DashboardResult};
pub use health::{HealthRecord, HealthStatus, OverallHealth, SystemHealth};
pub use response::{ApiResponse, FailureKind};
pub use service::Service;
pub use stock::{
    FundamentalData, MlPrediction, NewsSentiment, PriceData, Signal, SocialSentiment,
    TechnicalAnalysis,
};
