// Shared transport configuration for building reqwest::Client instances.
//
// The API client and the token provider share one HTTP client so that
// timeouts and the user agent are configured in a single place.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Production SpaNET cloud endpoint.
pub const DEFAULT_BASE_URL: &str = "https://app.spanet.net.au/api";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// API root; every endpoint path is appended to it.
    pub base_url: Url,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Config pointing at a custom API root (tests, staging).
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("spanet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Transport)
    }

    /// Build a full endpoint URL: `{base}/{path}`.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let cfg = TransportConfig::with_base_url(Url::parse("http://localhost:9000/api/").unwrap());
        let url = cfg.endpoint("/Dashboard/7").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/Dashboard/7");
    }

    #[test]
    fn default_points_at_cloud() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.base_url.host_str(), Some("app.spanet.net.au"));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }
}
