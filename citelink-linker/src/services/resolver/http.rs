//! HTTP access for link sources
//!
//! Adapters talk to the network only through [`HttpFetch`], so tests can
//! substitute canned responses. Transport failures and non-success statuses
//! are both surfaced as [`SourceError`] and treated the same by the waterfall.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Overall request timeout
const REQUEST_TIMEOUT_SECS: u64 = 15;
/// Connection establishment timeout
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Link source errors
///
/// Always transient from the waterfall's point of view: logged and skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Response body with its status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail unless the status is 2xx
    pub fn require_success(self) -> Result<Self, SourceError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SourceError::Status(self.status))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SourceError> {
        serde_json::from_str(&self.body).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

/// Minimal HTTP surface used by link sources
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET `url` with extra request headers
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, SourceError>;

    /// HEAD `url`, returning the status code
    async fn head(&self, url: &str) -> Result<u16, SourceError>;
}

/// reqwest-backed fetcher
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, SourceError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        tracing::debug!(url = %url, "HTTP GET");

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }

    async fn head(&self, url: &str) -> Result<u16, SourceError> {
        tracing::debug!(url = %url, "HTTP HEAD");

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

/// Build a URL with percent-encoded query parameters
pub fn url_with_params(base: &str, params: &[(&str, &str)]) -> Result<String, SourceError> {
    reqwest::Url::parse_with_params(base, params)
        .map(|url| url.to_string())
        .map_err(|e| SourceError::InvalidRequest(e.to_string()))
}

/// Build a URL from a base, a `/`-separated identifier and query parameters
///
/// Each part of the identifier between slashes is percent-encoded as a path
/// segment, so `#`, `?` and `<>` inside DOIs stay in the path.
pub fn url_with_path(
    base: &str,
    identifier: &str,
    params: &[(&str, &str)],
) -> Result<String, SourceError> {
    let mut url =
        reqwest::Url::parse(base).map_err(|e| SourceError::InvalidRequest(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| SourceError::InvalidRequest(format!("Not a path URL: {}", base)))?
        .extend(identifier.split('/'));
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url.to_string())
}

/// Minimum spacing between calls to one source
///
/// A zero period disables throttling.
pub struct Throttle {
    limiter: Option<
        RateLimiter<
            governor::state::direct::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl Throttle {
    pub fn every(period: Duration) -> Self {
        Self {
            limiter: Quota::with_period(period).map(RateLimiter::direct),
        }
    }

    /// Wait until the next call is permitted
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_require_success() {
        assert!(HttpResponse::new(200, "{}").require_success().is_ok());
        assert!(matches!(
            HttpResponse::new(404, "").require_success(),
            Err(SourceError::Status(404))
        ));
    }

    #[test]
    fn test_json_parse_error() {
        let response = HttpResponse::new(200, "not json");
        let parsed: Result<serde_json::Value, _> = response.json();
        assert!(matches!(parsed, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_url_params_are_encoded() {
        let url = url_with_params("https://api.example.org/works", &[("q", "a b&c")]).unwrap();
        assert_eq!(url, "https://api.example.org/works?q=a+b%26c");
    }

    #[test]
    fn test_identifier_path_is_encoded() {
        let url = url_with_path(
            "https://api.unpaywall.org/v2",
            "10.1002/(SICI)1097-4571#x?y<z>",
            &[("email", "me@example.org")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.unpaywall.org/v2/10.1002/(SICI)1097-4571%23x%3Fy%3Cz%3E?email=me%40example.org"
        );

        let plain = url_with_path("https://api.example.org/paper", "DOI:10.1000/xyz", &[]).unwrap();
        assert_eq!(plain, "https://api.example.org/paper/DOI:10.1000/xyz");
    }

    #[tokio::test]
    async fn test_zero_period_does_not_wait() {
        let throttle = Throttle::every(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_throttle_spaces_calls() {
        let throttle = Throttle::every(Duration::from_millis(50));
        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
