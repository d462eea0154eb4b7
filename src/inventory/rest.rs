use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::InventoryError;
use crate::node::SessionId;

use super::{Inventory, SessionDetails, SessionSummary};

/// Default daemon REST endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SessionList {
    #[serde(default)]
    sessions: Vec<SessionSummary>,
}

/// Inventory backed by the emulator daemon's REST API.
///
/// - `GET {base}/sessions` lists sessions
/// - `GET {base}/sessions/{id}` describes one session
#[derive(Debug, Clone)]
pub struct RestInventory {
    base_url: String,
    client: Client,
}

impl RestInventory {
    /// Creates a client for `base_url` (e.g. `http://localhost:5000`).
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Request` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, InventoryError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InventoryError::Request {
                message: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    #[must_use]
    #[allow(missing_docs)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, InventoryError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| InventoryError::Request {
                message: format!("GET {url}: {e}"),
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(|e| InventoryError::Request {
            message: format!("GET {url}: {e}"),
        })?;
        response.json::<T>().map(Some).map_err(|e| InventoryError::Decode {
            message: format!("GET {url}: {e}"),
        })
    }
}

impl Inventory for RestInventory {
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, InventoryError> {
        Ok(self
            .get_json::<SessionList>("/sessions")?
            .map(|list| list.sessions)
            .unwrap_or_default())
    }

    fn get_session(&self, id: SessionId) -> Result<SessionDetails, InventoryError> {
        self.get_json::<SessionDetails>(&format!("/sessions/{id}"))?
            .ok_or(InventoryError::SessionNotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::inventory::resolve_monitored_nodes;
    use crate::node::NodeId;

    async fn daemon() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sessions": [{"id": 1, "state": 4, "nodes": 3}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": [
                    {"id": 1, "name": "n1", "type": 0},
                    {"id": 2, "name": "n2", "type": 0},
                    {"id": 3, "name": "sw", "type": 4}
                ],
                "links": []
            })))
            .mount(&server)
            .await;
        server
    }

    /// The blocking client must not run on a runtime worker.
    async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        tokio::task::spawn_blocking(f).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolves_nodes_over_rest() {
        let server = daemon().await;
        let base = format!("{}/", server.uri());

        let (session, nodes) = blocking(move || {
            let inv = RestInventory::new(base).unwrap();
            resolve_monitored_nodes(&inv, None).unwrap()
        })
        .await;
        assert_eq!(session, SessionId::new(1));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].id, NodeId::new(2));
        assert_eq!(nodes[1].channel, "/tmp/pycore.1/n2");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_session_maps_to_not_found() {
        let server = daemon().await;
        let base = server.uri();

        let res = blocking(move || RestInventory::new(base).unwrap().get_session(SessionId::new(42))).await;
        assert!(matches!(res, Err(InventoryError::SessionNotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let base = server.uri();

        let res = blocking(move || RestInventory::new(base).unwrap().list_sessions()).await;
        assert!(matches!(res, Err(InventoryError::Request { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let base = server.uri();

        let res = blocking(move || RestInventory::new(base).unwrap().list_sessions()).await;
        assert!(matches!(res, Err(InventoryError::Decode { .. })));
    }

    #[test]
    fn unreachable_daemon_is_request_error() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let inv = RestInventory::new(format!("http://127.0.0.1:{port}")).unwrap();
        assert!(matches!(
            inv.list_sessions(),
            Err(InventoryError::Request { .. })
        ));
    }
}
