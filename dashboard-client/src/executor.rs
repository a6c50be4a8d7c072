//! Single-request executor
//!
//! Issues one HTTP request with a per-call timeout and folds every failure
//! mode into [`ApiResponse::Failure`]. There are no retries at this layer.

use std::time::Duration;

use dashboard_core::ApiResponse;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, error, instrument};

/// Per-request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Merged over the default `Content-Type: application/json`
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Overrides the executor's default timeout
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP request executor shared by all service calls
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    default_timeout: Duration,
    /// Log decoded response bodies
    verbose: bool,
}

impl RequestExecutor {
    /// Create a new executor with the given default timeout
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            default_timeout,
            verbose: false,
        }
    }

    /// Enable logging of response bodies
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute one request.
    ///
    /// Dropping the in-flight future on timeout cancels the request, so a
    /// late response can never surface.
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn execute(&self, url: &str, options: RequestOptions) -> ApiResponse {
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        debug!("API request: {} {}", options.method, url);

        match tokio::time::timeout(timeout, self.send(request)).await {
            Err(_) => {
                error!("API timeout after {}ms: {}", timeout.as_millis(), url);
                ApiResponse::timeout(format!(
                    "Request timed out after {}ms",
                    timeout.as_millis()
                ))
            }
            Ok(Err(message)) => {
                error!("API error: {}: {}", url, message);
                ApiResponse::error(message)
            }
            Ok(Ok((status, data))) => {
                if self.verbose {
                    debug!("API response: {} ({}): {}", url, status, data);
                } else {
                    debug!("API response: {} ({})", url, status);
                }
                ApiResponse::success(data, status)
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<(u16, Value), String> {
        let response = request
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            ));
        }

        let data = response
            .json::<Value>()
            .await
            .map_err(|e| format!("Failed to decode response body: {}", e))?;

        Ok((status.as_u16(), data))
    }
}
