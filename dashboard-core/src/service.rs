//! Backend service definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DashboardError;

/// The seven independently addressable backend services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Quotes and price history
    Price,
    /// Technical indicators and trading signals
    Technical,
    /// Ratios and company profiles
    Fundamental,
    /// News sentiment
    News,
    /// Reddit/Twitter sentiment
    Social,
    /// Cross-service orchestration and recommendations
    Orchestrator,
    /// Model predictions and training
    Ml,
}

impl Service {
    /// All services, in registry order
    pub const ALL: [Service; 7] = [
        Service::Price,
        Service::Technical,
        Service::Fundamental,
        Service::News,
        Service::Social,
        Service::Orchestrator,
        Service::Ml,
    ];

    /// Lowercase identifier used in URLs, cache keys and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Price => "price",
            Service::Technical => "technical",
            Service::Fundamental => "fundamental",
            Service::News => "news",
            Service::Social => "social",
            Service::Orchestrator => "orchestrator",
            Service::Ml => "ml",
        }
    }

    /// Environment variable holding the service's base URL
    pub fn env_var(&self) -> &'static str {
        match self {
            Service::Price => "PRICE_SERVICE_URL",
            Service::Technical => "TECHNICAL_SERVICE_URL",
            Service::Fundamental => "FUNDAMENTAL_SERVICE_URL",
            Service::News => "NEWS_SERVICE_URL",
            Service::Social => "SOCIAL_SERVICE_URL",
            Service::Orchestrator => "ORCHESTRATOR_SERVICE_URL",
            Service::Ml => "ML_SERVICE_URL",
        }
    }

    /// Path of the service's health endpoint, relative to its base URL
    ///
    /// The ML service exposes its own health route.
    pub fn health_path(&self) -> &'static str {
        match self {
            Service::Ml => "/ml-health",
            _ => "/health",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Service {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" => Ok(Service::Price),
            "technical" => Ok(Service::Technical),
            "fundamental" => Ok(Service::Fundamental),
            "news" => Ok(Service::News),
            "social" => Ok(Service::Social),
            "orchestrator" => Ok(Service::Orchestrator),
            "ml" => Ok(Service::Ml),
            _ => Err(DashboardError::unknown_service(s)),
        }
    }
}
