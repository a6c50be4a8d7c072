//! Service health records and the overall-status reduction

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::ApiResponse;
use crate::service::Service;

/// Health of a single service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
    /// Not checked yet
    Unknown,
}

impl HealthStatus {
    /// Interpret a `status` string reported by a service's health endpoint
    fn from_reported(reported: &str) -> Self {
        match reported.trim().to_lowercase().as_str() {
            "warning" | "degraded" => HealthStatus::Warning,
            "error" | "unhealthy" | "down" => HealthStatus::Error,
            _ => HealthStatus::Healthy,
        }
    }
}

/// Overall system health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
}

impl OverallHealth {
    /// `Healthy` iff every status is `Healthy`. No severity weighting.
    pub fn reduce<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a HealthStatus>,
    {
        if statuses.into_iter().all(|s| *s == HealthStatus::Healthy) {
            OverallHealth::Healthy
        } else {
            OverallHealth::Degraded
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, OverallHealth::Healthy)
    }
}

/// Latest health information for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    /// Health endpoint body on success, error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HealthRecord {
    /// Placeholder for a service that has not been checked
    pub fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_check: Utc::now(),
            details: None,
        }
    }

    /// Record for a probe that could not be completed
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            last_check: Utc::now(),
            details: Some(Value::String(message.into())),
        }
    }

    /// Map a health probe response onto a record.
    ///
    /// A failed request is `Error`. A successful one is `Healthy` unless the
    /// body reports a `status` of warning/degraded or error/unhealthy.
    pub fn from_response(response: &ApiResponse) -> Self {
        match response {
            ApiResponse::Success {
                data, timestamp, ..
            } => {
                let status = data
                    .get("status")
                    .and_then(Value::as_str)
                    .map(HealthStatus::from_reported)
                    .unwrap_or(HealthStatus::Healthy);
                Self {
                    status,
                    last_check: *timestamp,
                    details: Some(data.clone()),
                }
            }
            ApiResponse::Failure {
                error, timestamp, ..
            } => Self {
                status: HealthStatus::Error,
                last_check: *timestamp,
                details: Some(Value::String(error.clone())),
            },
        }
    }
}

/// Health of every registered service plus the reduced overall status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall: OverallHealth,
    pub services: IndexMap<Service, HealthRecord>,
}

impl SystemHealth {
    pub fn from_records(services: IndexMap<Service, HealthRecord>) -> Self {
        let overall = OverallHealth::reduce(services.values().map(|r| &r.status));
        Self { overall, services }
    }

    /// Snapshot with every service still unchecked
    pub fn unknown() -> Self {
        Self::from_records(
            Service::ALL
                .iter()
                .map(|s| (*s, HealthRecord::unknown()))
                .collect(),
        )
    }

    /// Replace one service's record and recompute the overall status
    pub fn update(&mut self, service: Service, record: HealthRecord) {
        self.services.insert(service, record);
        self.overall = OverallHealth::reduce(self.services.values().map(|r| &r.status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn healthy_system() -> SystemHealth {
        SystemHealth::from_records(
            Service::ALL
                .iter()
                .map(|s| {
                    (
                        *s,
                        HealthRecord::from_response(&ApiResponse::success(json!({"status": "ok"}), 200)),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_all_healthy_is_healthy() {
        assert_eq!(healthy_system().overall, OverallHealth::Healthy);
    }

    #[test]
    fn test_any_non_healthy_degrades() {
        for status in [HealthStatus::Warning, HealthStatus::Error, HealthStatus::Unknown] {
            let mut system = healthy_system();
            let mut record = system.services[&Service::News].clone();
            record.status = status;
            system.update(Service::News, record);
            assert_eq!(system.overall, OverallHealth::Degraded, "{:?}", status);
        }
    }

    #[test]
    fn test_reduce_of_empty_set_is_healthy() {
        assert_eq!(OverallHealth::reduce(&[] as &[HealthStatus]), OverallHealth::Healthy);
    }

    #[test]
    fn test_record_from_response() {
        let failed = HealthRecord::from_response(&ApiResponse::timeout("timed out"));
        assert_eq!(failed.status, HealthStatus::Error);
        assert_eq!(failed.details, Some(json!("timed out")));

        let warning =
            HealthRecord::from_response(&ApiResponse::success(json!({"status": "degraded"}), 200));
        assert_eq!(warning.status, HealthStatus::Warning);

        let bare = HealthRecord::from_response(&ApiResponse::success(json!("OK"), 200));
        assert_eq!(bare.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_unknown_snapshot_is_degraded() {
        let system = SystemHealth::unknown();
        assert_eq!(system.services.len(), 7);
        assert_eq!(system.overall, OverallHealth::Degraded);
    }
}
