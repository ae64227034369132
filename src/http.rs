//! JSON-over-HTTPS client shared by the remote wallet providers.

use crate::{Result, WalletError};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Thin reqwest wrapper that maps transport and status failures to
/// [`WalletError::ProviderApi`].
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    client: Client,
    provider: String,
    base_url: String,
}

impl ApiClient {
    pub fn new(provider: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let provider = provider.into();
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WalletError::Configuration(format!("{}: cannot build HTTP client: {}", provider, e))
        })?;

        Ok(Self {
            client,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request against a path below the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Request against an absolute URL.
    pub fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends the request and parses the JSON response body.
    ///
    /// An empty body yields `Value::Null`.
    ///
    /// # Errors
    ///
    /// [`WalletError::ProviderApi`] with `status: None` if no response
    /// arrived, or with the status and body text for non-2xx responses.
    pub async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(provider = %self.provider, %url, status = status.as_u16(), "Provider API response");

        if !status.is_success() {
            return Err(WalletError::provider_api(
                &self.provider,
                Some(status.as_u16()),
                body,
            ));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            WalletError::provider_api(
                &self.provider,
                Some(status.as_u16()),
                format!("malformed response body: {}", e),
            )
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> WalletError {
        let body = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        WalletError::provider_api(&self.provider, err.status().map(|s| s.as_u16()), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_success_and_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/things/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = ApiClient::new("test", &server.uri(), Duration::from_secs(5)).unwrap();
        let body = client.send(client.request(Method::GET, "/things/1")).await.unwrap();
        assert_eq!(body["id"], "1");

        let body = client.send(client.request(Method::DELETE, "/things/1")).await.unwrap();
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ApiClient::new("test", &server.uri(), Duration::from_secs(5)).unwrap();
        let err = client
            .send(client.request(Method::POST, "/things"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(502));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_timeout_has_no_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ApiClient::new("test", &server.uri(), Duration::from_millis(50)).unwrap();
        let err = client
            .send(client.request(Method::GET, "/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::ProviderApi { status: None, .. }));
    }
}
