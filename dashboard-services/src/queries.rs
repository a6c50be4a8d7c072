//! Typed query constructors, one per dashboard data view
//!
//! Each returns a fresh [`Query`] bound to one client operation. Pass the
//! matching [`QueryOptions`] preset or any override.

use std::sync::Arc;

use dashboard_client::{ServiceClient, DEFAULT_EVALUATION_DAYS};
use dashboard_core::{CompleteAnalysis, Signal, Subsystem};
use serde_json::Value;

use crate::aggregator::AnalysisAggregator;
use crate::query::{Query, QueryOptions};

/// Query over one per-ticker subsystem fetch
pub fn subsystem(
    client: ServiceClient,
    subsystem: Subsystem,
    options: QueryOptions,
) -> Query<String, Value> {
    let name = format!("get_{}_data", subsystem.as_str());
    Query::new(name, options, move |ticker: String| {
        let client = client.clone();
        async move {
            client
                .get_subsystem(subsystem, &ticker)
                .await?
                .into_result()
        }
    })
}

pub fn stock_price(client: ServiceClient, options: QueryOptions) -> Query<String, Value> {
    subsystem(client, Subsystem::Price, options)
}

pub fn technical_analysis(client: ServiceClient, options: QueryOptions) -> Query<String, Value> {
    subsystem(client, Subsystem::Technical, options)
}

pub fn fundamental_data(client: ServiceClient, options: QueryOptions) -> Query<String, Value> {
    subsystem(client, Subsystem::Fundamental, options)
}

pub fn news_sentiment(client: ServiceClient, options: QueryOptions) -> Query<String, Value> {
    subsystem(client, Subsystem::News, options)
}

pub fn social_sentiment(client: ServiceClient, options: QueryOptions) -> Query<String, Value> {
    subsystem(client, Subsystem::Social, options)
}

pub fn ml_prediction(client: ServiceClient, options: QueryOptions) -> Query<String, Value> {
    subsystem(client, Subsystem::Ml, options)
}

/// The [`QueryOptions`] preset for a subsystem
pub fn subsystem_options(subsystem: Subsystem) -> QueryOptions {
    match subsystem {
        Subsystem::Price => QueryOptions::price(),
        Subsystem::Technical => QueryOptions::technical(),
        Subsystem::Fundamental => QueryOptions::fundamental(),
        Subsystem::News => QueryOptions::news(),
        Subsystem::Social => QueryOptions::social(),
        Subsystem::Ml => QueryOptions::ml(),
    }
}

pub fn complete_analysis(
    aggregator: Arc<AnalysisAggregator>,
    options: QueryOptions,
) -> Query<String, CompleteAnalysis> {
    Query::new("get_complete_analysis", options, move |ticker: String| {
        let aggregator = Arc::clone(&aggregator);
        async move { aggregator.get_complete_analysis(&ticker).await }
    })
}

/// Arguments: `(limit, signal filter, minimum confidence)`
pub fn latest_predictions(
    client: ServiceClient,
    options: QueryOptions,
) -> Query<(u32, Option<Signal>, f64), Value> {
    Query::new(
        "get_latest_predictions",
        options,
        move |(limit, signal, min_confidence): (u32, Option<Signal>, f64)| {
            let client = client.clone();
            async move {
                client
                    .get_latest_predictions(limit, signal, min_confidence)
                    .await?
                    .into_result()
            }
        },
    )
}

/// Evaluation over the default lookback window
pub fn ml_performance(client: ServiceClient, options: QueryOptions) -> Query<(), Value> {
    Query::new("evaluate_ml_performance", options, move |_: ()| {
        let client = client.clone();
        async move {
            client
                .evaluate_ml_performance(DEFAULT_EVALUATION_DAYS)
                .await
                .into_result()
        }
    })
}

/// Arguments: `(ticker, days back, include accuracy)`
pub fn prediction_history(
    client: ServiceClient,
    options: QueryOptions,
) -> Query<(String, u32, bool), Value> {
    Query::new(
        "get_prediction_history",
        options,
        move |(ticker, days_back, include_accuracy): (String, u32, bool)| {
            let client = client.clone();
            async move {
                client
                    .get_prediction_history(&ticker, days_back, include_accuracy)
                    .await?
                    .into_result()
            }
        },
    )
}
