//! Real-time analysis feed
//!
//! Polls the complete analysis for one ticker on a fixed interval and
//! publishes each result on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashboard_core::{CompleteAnalysis, Subsystem};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregator::AnalysisAggregator;
use crate::health_monitor::clamp_poll_period;

/// Latest state of a feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    pub data: Option<CompleteAnalysis>,
    pub loading: bool,
    pub error: Option<String>,
    /// At least one subsystem answered on the last poll
    pub is_connected: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Handle to a running poll loop; dropping it stops the loop
pub struct RealTimeFeed {
    ticker: String,
    state: Arc<watch::Sender<FeedState>>,
    handle: JoinHandle<()>,
}

impl RealTimeFeed {
    /// Fetch immediately, then every `period`
    pub fn spawn(
        aggregator: Arc<AnalysisAggregator>,
        ticker: impl Into<String>,
        period: Duration,
    ) -> Self {
        let ticker = ticker.into();
        let period = clamp_poll_period(period);
        let (tx, _) = watch::channel(FeedState::default());
        let state = Arc::new(tx);

        info!("Starting real-time feed for {} every {}s", ticker, period.as_secs());
        let handle = tokio::spawn(Self::poll_loop(
            aggregator,
            ticker.clone(),
            period,
            Arc::clone(&state),
        ));

        Self {
            ticker,
            state,
            handle,
        }
    }

    async fn poll_loop(
        aggregator: Arc<AnalysisAggregator>,
        ticker: String,
        period: Duration,
        state: Arc<watch::Sender<FeedState>>,
    ) {
        let mut ticker_interval = interval(period);
        ticker_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker_interval.tick().await;
            state.send_modify(|s| {
                s.loading = true;
                s.error = None;
            });

            match aggregator.get_complete_analysis(&ticker).await {
                Ok(analysis) => {
                    let connected = analysis.failed_subsystems().len() < Subsystem::ALL.len();
                    if !connected {
                        warn!("Real-time feed for {}: every subsystem failed", ticker);
                    }
                    debug!("Real-time update for {}", ticker);
                    state.send_modify(|s| {
                        s.last_updated = Some(analysis.timestamp);
                        s.data = Some(analysis);
                        s.loading = false;
                        s.is_connected = connected;
                    });
                }
                Err(e) => {
                    warn!("Real-time feed for {} failed: {}", ticker, e);
                    state.send_modify(|s| {
                        s.loading = false;
                        s.error = Some(e.to_string());
                        s.is_connected = false;
                    });
                }
            }
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Stop polling and mark the feed disconnected
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RealTimeFeed {
    fn drop(&mut self) {
        self.handle.abort();
        self.state.send_modify(|s| {
            s.loading = false;
            s.is_connected = false;
        });
        debug!("Stopped real-time feed for {}", self.ticker);
    }
}
