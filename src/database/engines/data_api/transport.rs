//! HTTP transport for the Data API backend
//!
//! The backend talks to the network only through [`Transport`], so a client
//! can be handed a shared `reqwest` pool or a test double at construction.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Header carrying the Data API key
pub const API_KEY_HEADER: &str = "api-key";

/// One outgoing POST
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub api_key: SecretString,
    /// JSON-encoded request body
    pub body: Vec<u8>,
}

/// Status and raw body of one response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends a Data API request and returns the raw response
///
/// Implementations report network failures as [`Error::Transport`] and leave
/// status interpretation to the caller. Deadlines are enforced by the client,
/// not by the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] over a `reqwest` connection pool
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("mongo-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client })
    }

    /// Reuse an existing `reqwest` client (and its connection pool)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, request.api_key.expose_secret())
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Transport(format!("connection error: {}", e))
                } else {
                    Error::Transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {}", e)))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request(url: String, body: &serde_json::Value) -> HttpRequest {
        HttpRequest {
            url,
            api_key: SecretString::from("test-key"),
            body: serde_json::to_vec(body).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_post_sends_headers_and_body() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({ "dataSource": "Cluster0", "filter": { "a": 1 } });

        let mock = server
            .mock("POST", "/action/findOne")
            .match_header("content-type", "application/json")
            .match_header("api-key", "test-key")
            .match_body(Matcher::Json(body.clone()))
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .post(request(format!("{}/action/findOne", server.url()), &body))
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.body, b"unauthorized");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .post(request(
                format!("http://127.0.0.1:{port}/action/find"),
                &json!({}),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }
}
