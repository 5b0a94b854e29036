//! Directory endpoint query

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// External lookup service returning candidate `host:port` endpoints
/// for a numeric cell id.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn fetch(&self, cell_id: u32) -> Result<Vec<String>>;
}

const LOOKUP_PATH: &str = "ISteamDirectory/GetCMListForConnect/v1/";

/// HTTP timeout for directory queries
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    response: LookupPayload,
}

#[derive(Debug, Deserialize)]
struct LookupPayload {
    #[serde(default)]
    serverlist: Vec<ServerEntry>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    endpoint: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Production lookup against the public web API
#[derive(Debug, Clone)]
pub struct WebDirectoryLookup {
    client: reqwest::Client,
    base_url: Url,
}

impl WebDirectoryLookup {
    /// Creates a lookup client against the given API base URL.
    pub fn new(base_url: Url) -> Result<Self> {
        // rustls requires a process-level crypto provider before the
        // first TLS handshake.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Creates a lookup client reusing an existing reqwest client.
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl DirectoryLookup for WebDirectoryLookup {
    async fn fetch(&self, cell_id: u32) -> Result<Vec<String>> {
        let url = self
            .base_url
            .join(LOOKUP_PATH)
            .map_err(|source| Error::InvalidAddress {
                address: self.base_url.to_string(),
                source,
            })?;
        let response: LookupResponse = self
            .client
            .get(url)
            .query(&[
                ("cellid", cell_id.to_string()),
                ("cmtype", "websockets".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.response.success {
            return Err(Error::LookupFailed {
                message: response.response.message,
            });
        }

        let endpoints: Vec<String> = response
            .response
            .serverlist
            .into_iter()
            .filter(|entry| entry.kind.is_empty() || entry.kind == "websockets")
            .map(|entry| entry.endpoint)
            .collect();
        debug!(cell_id, count = endpoints.len(), "directory lookup complete");

        if endpoints.is_empty() {
            return Err(Error::NoServers { cell_id });
        }
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_fetch_parses_serverlist() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{LOOKUP_PATH}")))
            .and(query_param("cellid", "14"))
            .and(query_param("cmtype", "websockets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "serverlist": [
                        {"endpoint": "cm1.example.net:27021", "type": "websockets"},
                        {"endpoint": "cm2.example.net:443", "type": "websockets"},
                        {"endpoint": "cm3.example.net:27017", "type": "netfilter"},
                    ],
                    "success": true,
                    "message": ""
                }
            })))
            .mount(&server)
            .await;

        let lookup = WebDirectoryLookup::new(Url::parse(&server.uri()).unwrap()).unwrap();
        let endpoints = lookup.fetch(14).await.unwrap();
        assert_eq!(
            endpoints,
            vec!["cm1.example.net:27021", "cm2.example.net:443"]
        );
    }

    #[tokio::test]
    async fn test_fetch_unsuccessful_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"serverlist": [], "success": false, "message": "nope"}
            })))
            .mount(&server)
            .await;

        let lookup = WebDirectoryLookup::new(Url::parse(&server.uri()).unwrap()).unwrap();
        let err = lookup.fetch(0).await.unwrap_err();
        assert!(matches!(err, Error::LookupFailed { message } if message == "nope"));
    }

    #[tokio::test]
    async fn test_fetch_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"serverlist": [], "success": true, "message": ""}
            })))
            .mount(&server)
            .await;

        let lookup = WebDirectoryLookup::new(Url::parse(&server.uri()).unwrap()).unwrap();
        assert!(matches!(
            lookup.fetch(7).await.unwrap_err(),
            Error::NoServers { cell_id: 7 }
        ));
    }
}
