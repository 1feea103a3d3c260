//! HTTP client for the peer transfer endpoint.

use crate::error::{TransportError, TransportResult};
use depot_core::PackageId;
use depot_core::config::TransportConfig;

/// Client for `GET /capi/<api-key>/tran_pkg/<id>` on other nodes.
#[derive(Clone, Debug)]
pub struct PeerClient {
    http: reqwest::Client,
    api_key: String,
}

impl PeerClient {
    /// Build a client that authenticates to peers with `api_key`.
    pub fn new(api_key: impl Into<String>, config: &TransportConfig) -> TransportResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }

    /// Transfer URL of `id` on `node`. Bare `host:port` addresses use plain HTTP.
    pub fn transfer_url(&self, node: &str, id: &PackageId) -> String {
        let base = if node.starts_with("http://") || node.starts_with("https://") {
            node.trim_end_matches('/').to_string()
        } else {
            format!("http://{node}")
        };
        format!("{base}/capi/{}/tran_pkg/{id}", self.api_key)
    }

    /// Start fetching `id` from `node`.
    ///
    /// Returns the response once the status line is in; the body is
    /// consumed by the caller.
    pub async fn fetch(&self, node: &str, id: &PackageId) -> TransportResult<reqwest::Response> {
        let url = self.transfer_url(node, id);
        let response = self.http.get(&url).send().await.map_err(|e| {
            TransportError::PeerFetchFailed {
                node: node.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::PeerFetchFailed {
                node: node.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_url() {
        let client = PeerClient::new("key", &TransportConfig::default()).unwrap();
        let id = PackageId::new("abc").unwrap();

        assert_eq!(
            client.transfer_url("10.0.0.1:8080", &id),
            "http://10.0.0.1:8080/capi/key/tran_pkg/abc"
        );
        assert_eq!(
            client.transfer_url("https://node.example/", &id),
            "https://node.example/capi/key/tran_pkg/abc"
        );
    }
}
