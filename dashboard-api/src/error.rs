//! Mapping of dashboard errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use dashboard_core::DashboardError;
use serde::Serialize;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// A handler failure with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        let status = match &e {
            DashboardError::Validation(_) | DashboardError::UnknownService(_) => {
                StatusCode::BAD_REQUEST
            }
            DashboardError::Request(_) | DashboardError::Timeout(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Superseded => StatusCode::CONFLICT,
            DashboardError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            timestamp: Utc::now(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(DashboardError::validation("empty ticker")).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DashboardError::unknown_service("crypto")).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DashboardError::timeout("Request timed out after 10000ms")).status,
            StatusCode::BAD_GATEWAY
        );
    }
}
