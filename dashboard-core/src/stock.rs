//! Typed views of the per-ticker payloads returned by the data services
//!
//! Services send more fields than these; unknown fields are ignored and
//! optional ones default, so decoding stays tolerant of schema drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading signal emitted by the ML service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

impl std::str::FromStr for Signal {
    type Err = crate::DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            other => Err(crate::DashboardError::validation(format!(
                "unknown signal: {}",
                other
            ))),
        }
    }
}

/// Latest quote for a ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub ticker: String,
    pub current_price: f64,
    #[serde(default)]
    pub daily_change: f64,
    #[serde(default)]
    pub daily_change_percent: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Technical indicator snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub ticker: String,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub macd: Option<f64>,
    #[serde(default)]
    pub macd_signal: Option<f64>,
    #[serde(default)]
    pub macd_histogram: Option<f64>,
    #[serde(default)]
    pub sma_20: Option<f64>,
    #[serde(default)]
    pub sma_50: Option<f64>,
    #[serde(default)]
    pub bollinger_upper: Option<f64>,
    #[serde(default)]
    pub bollinger_lower: Option<f64>,
    /// Position of the close within the bands, 0.0 (lower) to 1.0 (upper)
    #[serde(default)]
    pub bollinger_position: Option<f64>,
    #[serde(default)]
    pub atr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fundamental ratios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalData {
    pub ticker: String,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub pb_ratio: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub current_ratio: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregated news sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSentiment {
    pub ticker: String,
    /// -1.0 (bearish) to 1.0 (bullish)
    pub sentiment_score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub article_count: u32,
    #[serde(default)]
    pub positive_count: u32,
    #[serde(default)]
    pub negative_count: u32,
    #[serde(default)]
    pub neutral_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregated social media sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialSentiment {
    pub ticker: String,
    pub overall_sentiment: f64,
    #[serde(default)]
    pub reddit_sentiment: Option<f64>,
    #[serde(default)]
    pub twitter_sentiment: Option<f64>,
    #[serde(default)]
    pub mention_count: u32,
    #[serde(default)]
    pub buzz_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Model prediction for a ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    pub ticker: String,
    pub signal: Signal,
    /// 0.0 to 1.0
    pub confidence: f64,
    #[serde(default)]
    pub predicted_return: Option<f64>,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_prediction_ignores_extra_fields() {
        let raw = json!({
            "ticker": "RELIANCE.NS",
            "signal": "BUY",
            "confidence": 0.85,
            "predicted_return": 4.1,
            "model_version": "v3"
        });

        let prediction: MlPrediction = serde_json::from_value(raw).unwrap();
        assert_eq!(prediction.signal, Signal::Buy);
        assert_eq!(prediction.target_price, None);
    }

    #[test]
    fn test_parse_signal() {
        assert_eq!("sell".parse::<Signal>().unwrap(), Signal::Sell);
        assert!("moon".parse::<Signal>().is_err());
    }
}
