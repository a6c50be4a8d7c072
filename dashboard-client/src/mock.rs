//! Fixed demo payloads served when mock mode is enabled

use chrono::Utc;
use dashboard_core::{
    FundamentalData, MlPrediction, NewsSentiment, PriceData, Signal, SocialSentiment, Subsystem,
    TechnicalAnalysis,
};
use serde_json::Value;

/// Demo payload for one subsystem and ticker
pub fn mock_payload(subsystem: Subsystem, ticker: &str) -> Value {
    let ticker = ticker.to_string();
    let now = Some(Utc::now());

    let value = match subsystem {
        Subsystem::Price => serde_json::to_value(PriceData {
            ticker,
            current_price: 2547.30,
            daily_change: 15.40,
            daily_change_percent: 0.61,
            volume: 2_547_890,
            market_cap: Some(172_500_000_000.0),
            last_updated: now,
        }),
        Subsystem::Technical => serde_json::to_value(TechnicalAnalysis {
            ticker,
            rsi: Some(68.5),
            macd: Some(12.4),
            macd_signal: Some(8.2),
            macd_histogram: Some(4.2),
            sma_20: Some(2530.50),
            sma_50: Some(2485.20),
            bollinger_upper: Some(2580.0),
            bollinger_lower: Some(2480.0),
            bollinger_position: Some(0.75),
            atr: Some(45.2),
            last_updated: now,
        }),
        Subsystem::Fundamental => serde_json::to_value(FundamentalData {
            ticker,
            pe_ratio: Some(24.8),
            pb_ratio: Some(2.1),
            roe: Some(12.8),
            debt_to_equity: Some(0.45),
            current_ratio: Some(1.8),
            market_cap: Some(172_500_000_000.0),
            revenue_growth: Some(8.5),
            profit_margin: Some(15.2),
            last_updated: now,
        }),
        Subsystem::News => serde_json::to_value(NewsSentiment {
            ticker,
            sentiment_score: 0.25,
            confidence: 0.78,
            article_count: 15,
            positive_count: 8,
            negative_count: 3,
            neutral_count: 4,
            last_updated: now,
        }),
        Subsystem::Social => serde_json::to_value(SocialSentiment {
            ticker,
            overall_sentiment: 0.15,
            reddit_sentiment: Some(0.12),
            twitter_sentiment: Some(0.18),
            mention_count: 245,
            buzz_score: 0.6,
            last_updated: now,
        }),
        Subsystem::Ml => serde_json::to_value(MlPrediction {
            ticker,
            signal: Signal::Buy,
            confidence: 0.85,
            predicted_return: Some(4.1),
            target_price: Some(2650.0),
            risk_score: Some(0.3),
            prediction_date: now,
        }),
    };

    // Plain structs of numbers and strings always serialize
    value.unwrap_or(Value::Null)
}
