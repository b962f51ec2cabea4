//! HTTP transport shared by every source
//!
//! One pooled `reqwest` client is built per orchestrator and cloned cheaply
//! into resolvers. All helpers treat any non-200 status as an error and an
//! empty body as a failure, so callers only see usable payloads.

use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::error::{ResolverError, Result};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Upper bound on any single request; per-call timeouts are usually shorter
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// TCP keep-alive duration
    pub tcp_keepalive: Option<Duration>,

    /// Enable gzip response decoding
    pub enable_compression: bool,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Some(Duration::from_secs(60)),
            enable_compression: true,
            user_agent: concat!("depotgate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Pooled HTTP client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(true)
            .tcp_keepalive(config.tcp_keepalive)
            .use_rustls_tls()
            .gzip(config.enable_compression)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// `GET` returning the raw status and body, for callers that branch on
    /// status codes themselves
    pub async fn get_raw(&self, url: &str, timeout: Duration) -> Result<(StatusCode, Bytes)> {
        trace!("GET {url}");
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body))
    }

    /// `GET` a non-empty body
    pub async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Bytes> {
        self.send_bytes(self.client.get(url), url, timeout).await
    }

    /// `GET` a non-empty body with a bearer token
    pub async fn get_bytes_bearer(
        &self,
        url: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Bytes> {
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        self.send_bytes(request, url, timeout).await
    }

    /// `GET` and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        let request = self.client.get(url).header(ACCEPT, "application/json");
        let body = self.send_bytes(request, url, timeout).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET` and decode a JSON body with a bearer token
    pub async fn get_json_bearer<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<T> {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"));
        let body = self.send_bytes(request, url, timeout).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `POST` with an empty body and decode a JSON response
    pub async fn post_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        let request = self.client.post(url).header(ACCEPT, "application/json");
        let body = self.send_bytes(request, url, timeout).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_bytes(
        &self,
        request: RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> Result<Bytes> {
        trace!("request {url}");
        let response = request.timeout(timeout).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolverError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ResolverError::EmptyResponse(url.to_string()));
        }
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("Operation should succeed");
        let url = format!("{}/missing", server.uri());
        let err = client
            .get_bytes(&url, Duration::from_secs(5))
            .await
            .expect_err("404 should fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("Operation should succeed");
        let url = format!("{}/empty", server.uri());
        assert!(matches!(
            client.get_bytes(&url, Duration::from_secs(5)).await,
            Err(ResolverError::EmptyResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_bearer_header_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1,2]"))
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("Operation should succeed");
        let url = format!("{}/secure", server.uri());
        let body: Vec<u32> = client
            .get_json_bearer(&url, "abc", Duration::from_secs(5))
            .await
            .expect("Operation should succeed");
        assert_eq!(body, vec![1, 2]);
    }
}
