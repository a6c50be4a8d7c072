//! Normalized outcome of a single upstream request

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{DashboardError, DashboardResult};

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// No response arrived before the request timeout
    Timeout,
    /// Transport failure, non-2xx status or undecodable body
    Error,
}

/// Result of one upstream call.
///
/// Transport errors, HTTP errors, timeouts and decode failures all collapse
/// into [`ApiResponse::Failure`], so callers only ever branch on the variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireResponse")]
pub enum ApiResponse {
    Success {
        data: Value,
        status: u16,
        timestamp: DateTime<Utc>,
        /// Served from the fixed demo payloads rather than the network
        is_mock: bool,
    },
    Failure {
        error: String,
        status: FailureKind,
        timestamp: DateTime<Utc>,
    },
}

impl ApiResponse {
    pub fn success(data: Value, status: u16) -> Self {
        ApiResponse::Success {
            data,
            status,
            timestamp: Utc::now(),
            is_mock: false,
        }
    }

    pub fn mock(data: Value) -> Self {
        ApiResponse::Success {
            data,
            status: 200,
            timestamp: Utc::now(),
            is_mock: true,
        }
    }

    pub fn failure(error: impl Into<String>, status: FailureKind) -> Self {
        ApiResponse::Failure {
            error: error.into(),
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::failure(error, FailureKind::Error)
    }

    pub fn timeout(error: impl Into<String>) -> Self {
        Self::failure(error, FailureKind::Timeout)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiResponse::Success { data, .. } => Some(data),
            ApiResponse::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ApiResponse::Success { .. } => None,
            ApiResponse::Failure { error, .. } => Some(error),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ApiResponse::Success { .. } => None,
            ApiResponse::Failure { status, .. } => Some(*status),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ApiResponse::Success { timestamp, .. } | ApiResponse::Failure { timestamp, .. } => {
                *timestamp
            }
        }
    }

    /// Convert into the decoded body, mapping failures onto retryable errors
    pub fn into_result(self) -> DashboardResult<Value> {
        match self {
            ApiResponse::Success { data, .. } => Ok(data),
            ApiResponse::Failure {
                error,
                status: FailureKind::Timeout,
                ..
            } => Err(DashboardError::Timeout(error)),
            ApiResponse::Failure { error, .. } => Err(DashboardError::Request(error)),
        }
    }

    /// Decode the body of a successful response into a typed payload
    pub fn parse_data<T: DeserializeOwned>(&self) -> DashboardResult<T> {
        match self {
            ApiResponse::Success { data, .. } => serde_json::from_value(data.clone())
                .map_err(|e| DashboardError::request(format!("failed to decode payload: {}", e))),
            ApiResponse::Failure { error, status, .. } => Err(match status {
                FailureKind::Timeout => DashboardError::Timeout(error.clone()),
                FailureKind::Error => DashboardError::Request(error.clone()),
            }),
        }
    }
}

impl Serialize for ApiResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ApiResponse::Success {
                data,
                status,
                timestamp,
                is_mock,
            } => {
                let len = if *is_mock { 5 } else { 4 };
                let mut s = serializer.serialize_struct("ApiResponse", len)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
                s.serialize_field("status", status)?;
                s.serialize_field("timestamp", timestamp)?;
                if *is_mock {
                    s.serialize_field("isMock", &true)?;
                }
                s.end()
            }
            ApiResponse::Failure {
                error,
                status,
                timestamp,
            } => {
                let mut s = serializer.serialize_struct("ApiResponse", 4)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
                s.serialize_field("status", status)?;
                s.serialize_field("timestamp", timestamp)?;
                s.end()
            }
        }
    }
}

/// Flat JSON shape used on the wire
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
    status: WireStatus,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    is_mock: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireStatus {
    Code(u16),
    Kind(FailureKind),
}

impl TryFrom<WireResponse> for ApiResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        match (wire.success, wire.status) {
            (true, WireStatus::Code(status)) => Ok(ApiResponse::Success {
                data: wire.data,
                status,
                timestamp: wire.timestamp,
                is_mock: wire.is_mock,
            }),
            (false, WireStatus::Kind(status)) => Ok(ApiResponse::Failure {
                error: wire.error.unwrap_or_default(),
                status,
                timestamp: wire.timestamp,
            }),
            (true, _) => Err("successful response must carry a numeric status".to_string()),
            (false, _) => Err("failed response must carry 'timeout' or 'error' status".to_string()),
        }
    }
}
