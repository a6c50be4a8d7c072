//! Dashboard configuration
//!
//! Everything here is read once at process start and is immutable afterwards.
//! The endpoint registry is handed to the service client at construction time.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{DashboardError, DashboardResult};
use crate::service::Service;

/// Default request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default simulated latency for mock responses in milliseconds
pub const DEFAULT_MOCK_DELAY_MS: u64 = 1_000;

/// Default health polling interval in seconds
pub const DEFAULT_HEALTH_POLL_SECS: u64 = 30;

/// Default port for the dashboard API server
pub const DEFAULT_SERVER_PORT: u16 = 3001;

/// Mapping from service to base URL
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: HashMap<Service, String>,
}

impl EndpointRegistry {
    /// Build a registry from explicit base URLs.
    ///
    /// Every service must be present and every URL must parse. Trailing
    /// slashes are stripped so operation paths can be appended directly.
    pub fn new(
        endpoints: impl IntoIterator<Item = (Service, String)>,
    ) -> DashboardResult<Self> {
        let mut map = HashMap::new();
        for (service, raw) in endpoints {
            let trimmed = raw.trim().trim_end_matches('/').to_string();
            Url::parse(&trimmed).map_err(|e| {
                DashboardError::config(format!("invalid {} service URL '{}': {}", service, raw, e))
            })?;
            map.insert(service, trimmed);
        }

        if let Some(missing) = Service::ALL.iter().find(|s| !map.contains_key(s)) {
            return Err(DashboardError::config(format!(
                "no base URL configured for {} service",
                missing
            )));
        }

        Ok(Self { endpoints: map })
    }

    /// Every service pointed at the same base URL (handy for a single gateway or tests)
    pub fn uniform(base_url: &str) -> DashboardResult<Self> {
        Self::new(Service::ALL.iter().map(|s| (*s, base_url.to_string())))
    }

    /// Placeholder Azure Function URL for a service
    pub fn default_url(service: Service) -> String {
        format!("https://your-{}-service.azurewebsites.net/api", service)
    }

    /// Base URL for a service
    pub fn base_url(&self, service: Service) -> &str {
        // Construction guarantees every service is present
        self.endpoints
            .get(&service)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Base URL joined with an operation path
    pub fn url(&self, service: Service, path: &str) -> String {
        format!("{}{}", self.base_url(service), path)
    }
}

/// Process-wide dashboard configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub endpoints: EndpointRegistry,
    /// Default per-request timeout
    pub request_timeout: Duration,
    /// Verbose request/response logging
    pub debug: bool,
    /// Serve fixed demo payloads instead of calling the data services
    pub use_mock_data: bool,
    /// Simulated latency for mock payloads
    pub mock_delay: Duration,
    /// How often the health monitor polls
    pub health_poll_interval: Duration,
    pub server_port: u16,
}

impl DashboardConfig {
    /// Defaults for the given endpoints
    pub fn new(endpoints: EndpointRegistry) -> Self {
        Self {
            endpoints,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            debug: false,
            use_mock_data: false,
            mock_delay: Duration::from_millis(DEFAULT_MOCK_DELAY_MS),
            health_poll_interval: Duration::from_secs(DEFAULT_HEALTH_POLL_SECS),
            server_port: DEFAULT_SERVER_PORT,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads one `*_SERVICE_URL` per service plus:
    /// - API_TIMEOUT_MS
    /// - DEBUG_MODE
    /// - USE_MOCK_DATA
    /// - MOCK_DELAY_MS
    /// - HEALTH_POLL_INTERVAL_SECS
    /// - SERVER_PORT
    pub fn from_env() -> DashboardResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> DashboardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoints = EndpointRegistry::new(Service::ALL.iter().map(|service| {
            let url = lookup(service.env_var())
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| EndpointRegistry::default_url(*service));
            (*service, url)
        }))?;

        let timeout_ms = parse_var(&lookup, "API_TIMEOUT_MS")?.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(DashboardError::config("API_TIMEOUT_MS must be positive"));
        }
        let poll_secs = parse_var(&lookup, "HEALTH_POLL_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_HEALTH_POLL_SECS);
        if poll_secs == 0 {
            return Err(DashboardError::config(
                "HEALTH_POLL_INTERVAL_SECS must be positive",
            ));
        }

        Ok(Self {
            endpoints,
            request_timeout: Duration::from_millis(timeout_ms),
            debug: parse_bool(&lookup, "DEBUG_MODE")?.unwrap_or(false),
            use_mock_data: parse_bool(&lookup, "USE_MOCK_DATA")?.unwrap_or(false),
            mock_delay: Duration::from_millis(
                parse_var(&lookup, "MOCK_DELAY_MS")?.unwrap_or(DEFAULT_MOCK_DELAY_MS),
            ),
            health_poll_interval: Duration::from_secs(poll_secs),
            server_port: parse_var(&lookup, "SERVER_PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> DashboardResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| DashboardError::config(format!("invalid {}='{}': {}", key, raw, e))),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> DashboardResult<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(None),
        Some(v) if v == "true" || v == "1" => Ok(Some(true)),
        Some(v) if v == "false" || v == "0" || v.is_empty() => Ok(Some(false)),
        Some(v) => Err(DashboardError::config(format!("invalid {}='{}'", key, v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = DashboardConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(10_000));
        assert!(!config.debug);
        assert!(!config.use_mock_data);
        assert_eq!(config.server_port, 3001);
        assert_eq!(
            config.endpoints.base_url(Service::Price),
            "https://your-price-service.azurewebsites.net/api"
        );
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = DashboardConfig::from_lookup(lookup_from(&[
            ("PRICE_SERVICE_URL", "http://localhost:7071/api/"),
            ("API_TIMEOUT_MS", "2500"),
            ("DEBUG_MODE", "true"),
            ("USE_MOCK_DATA", "1"),
        ]))
        .unwrap();

        assert_eq!(config.endpoints.base_url(Service::Price), "http://localhost:7071/api");
        assert_eq!(
            config.endpoints.url(Service::Price, "/price-data"),
            "http://localhost:7071/api/price-data"
        );
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert!(config.debug);
        assert!(config.use_mock_data);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = DashboardConfig::from_lookup(lookup_from(&[("API_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));

        let err = DashboardConfig::from_lookup(lookup_from(&[("ML_SERVICE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));

        let err = DashboardConfig::from_lookup(lookup_from(&[("DEBUG_MODE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn test_zero_periods_rejected() {
        let err = DashboardConfig::from_lookup(lookup_from(&[("API_TIMEOUT_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));

        let err =
            DashboardConfig::from_lookup(lookup_from(&[("HEALTH_POLL_INTERVAL_SECS", "0")]))
                .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn test_registry_requires_every_service() {
        let err = EndpointRegistry::new([(Service::Price, "http://localhost".to_string())])
            .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }
}
