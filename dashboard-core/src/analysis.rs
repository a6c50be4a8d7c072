//! Per-ticker aggregate of every analysis subsystem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::{ApiResponse, FailureKind};
use crate::service::Service;

/// The six per-ticker subsystems that make up a complete analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Price,
    Technical,
    Fundamental,
    News,
    Social,
    Ml,
}

impl Subsystem {
    pub const ALL: [Subsystem; 6] = [
        Subsystem::Price,
        Subsystem::Technical,
        Subsystem::Fundamental,
        Subsystem::News,
        Subsystem::Social,
        Subsystem::Ml,
    ];

    /// Backend service that serves this subsystem
    pub fn service(&self) -> Service {
        match self {
            Subsystem::Price => Service::Price,
            Subsystem::Technical => Service::Technical,
            Subsystem::Fundamental => Service::Fundamental,
            Subsystem::News => Service::News,
            Subsystem::Social => Service::Social,
            Subsystem::Ml => Service::Ml,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.service().as_str()
    }
}

impl std::str::FromStr for Subsystem {
    type Err = crate::DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let service: Service = s.parse()?;
        Subsystem::ALL
            .into_iter()
            .find(|sub| sub.service() == service)
            .ok_or_else(|| {
                crate::DashboardError::validation(format!("{} is not a per-ticker subsystem", s))
            })
    }
}

/// Why one subsystem slot is empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotError {
    pub error: String,
    pub status: FailureKind,
    pub timestamp: DateTime<Utc>,
}

/// One value per subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slots<T> {
    pub price: Option<T>,
    pub technical: Option<T>,
    pub fundamental: Option<T>,
    pub news: Option<T>,
    pub social: Option<T>,
    pub ml: Option<T>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            price: None,
            technical: None,
            fundamental: None,
            news: None,
            social: None,
            ml: None,
        }
    }
}

impl<T> Slots<T> {
    pub fn get(&self, subsystem: Subsystem) -> Option<&T> {
        match subsystem {
            Subsystem::Price => self.price.as_ref(),
            Subsystem::Technical => self.technical.as_ref(),
            Subsystem::Fundamental => self.fundamental.as_ref(),
            Subsystem::News => self.news.as_ref(),
            Subsystem::Social => self.social.as_ref(),
            Subsystem::Ml => self.ml.as_ref(),
        }
    }

    fn slot_mut(&mut self, subsystem: Subsystem) -> &mut Option<T> {
        match subsystem {
            Subsystem::Price => &mut self.price,
            Subsystem::Technical => &mut self.technical,
            Subsystem::Fundamental => &mut self.fundamental,
            Subsystem::News => &mut self.news,
            Subsystem::Social => &mut self.social,
            Subsystem::Ml => &mut self.ml,
        }
    }
}

/// Data slots of a complete analysis, keyed by the uppercased ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    pub ticker: String,
    #[serde(flatten)]
    pub slots: Slots<Value>,
}

/// Aggregate of all six subsystems for one ticker.
///
/// Always `success: true`: a failing subsystem leaves its data slot empty and
/// records why in the matching error slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteAnalysis {
    pub success: bool,
    pub data: AnalysisData,
    pub errors: Slots<SlotError>,
    pub timestamp: DateTime<Utc>,
}

impl CompleteAnalysis {
    /// Empty aggregate for an already-normalized ticker
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            success: true,
            data: AnalysisData {
                ticker: ticker.into(),
                slots: Slots::default(),
            },
            errors: Slots::default(),
            timestamp: Utc::now(),
        }
    }

    /// Place one subsystem's outcome into its slot
    pub fn record(&mut self, subsystem: Subsystem, response: ApiResponse) {
        match response {
            ApiResponse::Success { data, .. } => {
                *self.data.slots.slot_mut(subsystem) = Some(data);
                *self.errors.slot_mut(subsystem) = None;
            }
            ApiResponse::Failure {
                error,
                status,
                timestamp,
            } => {
                *self.data.slots.slot_mut(subsystem) = None;
                *self.errors.slot_mut(subsystem) = Some(SlotError {
                    error,
                    status,
                    timestamp,
                });
            }
        }
    }

    /// Mark the aggregate as complete as of now
    pub fn finish(mut self) -> Self {
        self.timestamp = Utc::now();
        self
    }

    pub fn data(&self, subsystem: Subsystem) -> Option<&Value> {
        self.data.slots.get(subsystem)
    }

    pub fn error(&self, subsystem: Subsystem) -> Option<&SlotError> {
        self.errors.get(subsystem)
    }

    /// Subsystems whose request failed
    pub fn failed_subsystems(&self) -> Vec<Subsystem> {
        Subsystem::ALL
            .into_iter()
            .filter(|s| self.errors.get(*s).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_success_and_failure() {
        let mut analysis = CompleteAnalysis::new("TCS.NS");
        analysis.record(Subsystem::Price, ApiResponse::success(json!({"current_price": 3900.0}), 200));
        analysis.record(Subsystem::News, ApiResponse::timeout("timed out"));

        assert_eq!(analysis.data(Subsystem::Price), Some(&json!({"current_price": 3900.0})));
        assert!(analysis.error(Subsystem::Price).is_none());
        assert!(analysis.data(Subsystem::News).is_none());
        assert_eq!(
            analysis.error(Subsystem::News).map(|e| e.status),
            Some(FailureKind::Timeout)
        );
        assert_eq!(analysis.failed_subsystems(), vec![Subsystem::News]);
        assert!(analysis.success);
    }

    #[test]
    fn test_wire_shape() {
        let mut analysis = CompleteAnalysis::new("INFY.NS");
        analysis.record(Subsystem::Ml, ApiResponse::error("HTTP 502: Bad Gateway"));
        let value = serde_json::to_value(&analysis).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"]["ticker"], json!("INFY.NS"));
        assert_eq!(value["data"]["ml"], json!(null));
        assert_eq!(value["errors"]["ml"]["status"], json!("error"));
        assert_eq!(value["errors"]["price"], json!(null));
    }

    #[test]
    fn test_parse_subsystem() {
        assert_eq!("ML".parse::<Subsystem>().unwrap(), Subsystem::Ml);
        assert!("orchestrator".parse::<Subsystem>().unwrap_err().is_validation());
        assert!("weather".parse::<Subsystem>().is_err());
    }
}
