//! JSON-RPC client for the local control plane.
//!
//! Handles carry the security token as a query-string credential on the
//! connection target. Handles are cached per callsign in a
//! [`ClientRegistry`] with per-key single initialization, so two tasks can
//! never race to build the same handle with different tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::token::{SecurityToken, TokenBroker};

/// Timeout applied to every control-plane RPC, enforced by the transport.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(2000);

/// JSON-RPC resource path on the control plane.
const RPC_PATH: &str = "/jsonrpc";

/// Control-plane call errors.
///
/// Callers that need to distinguish "the controller said no" from "the
/// controller could not be reached" match on the variant; callers that only
/// care about success treat every variant the same.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response (connect failure,
    /// timeout, broken connection).
    #[error("transport error: {0}")]
    Transport(String),

    /// The control plane answered with a non-success HTTP status.
    #[error("http status {0}")]
    Http(u16),

    /// The control plane answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response could not be interpreted (bad envelope, missing result,
    /// unexpected shape).
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request targeted an empty callsign.
    #[error("invalid callsign: must be non-empty")]
    InvalidCallsign,
}

/// Client handle bound to one connection target.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl ControlPlaneClient {
    fn new(base_url: &str, token: Option<&SecurityToken>) -> Self {
        let url = match token {
            Some(token) if !token.is_empty() => {
                format!("{}{}?token={}", base_url, RPC_PATH, token.expose())
            }
            _ => format!("{}{}", base_url, RPC_PATH),
        };
        Self {
            http: reqwest::Client::new(),
            url,
            next_id: AtomicU64::new(1),
        }
    }

    /// Invoke a JSON-RPC method with the standard control-plane timeout.
    ///
    /// `Value::Null` params are omitted from the envelope.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if !params.is_null() {
            request["params"] = params;
        }

        debug!(%method, id, "control-plane rpc");

        let response = self
            .http
            .post(&self.url)
            .timeout(RPC_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|error| ClientError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http(status.as_u16()));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|error| ClientError::MalformedResponse(error.to_string()))?;

        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(ClientError::Rpc { code, message });
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| ClientError::MalformedResponse("missing result".to_string()))
    }
}

/// Per-callsign cache of control-plane client handles.
///
/// The map lock is held across handle construction, including the token
/// acquisition a first build triggers, which gives each key exactly one
/// initialization. Handles are immutable after construction and shared via
/// `Arc`.
pub struct ClientRegistry {
    base_url: String,
    broker: Arc<TokenBroker>,
    clients: Mutex<HashMap<String, Arc<ControlPlaneClient>>>,
}

impl ClientRegistry {
    pub fn new(base_url: impl Into<String>, broker: Arc<TokenBroker>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            broker,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Get or build the client handle for `callsign`.
    ///
    /// Token acquisition failures degrade to an unauthenticated handle and
    /// a warn log; the controller will reject the calls if it does enforce
    /// security, and the handle is rebuilt unauthenticated rather than the
    /// call path erroring out here.
    pub async fn client(&self, callsign: &str) -> Arc<ControlPlaneClient> {
        let mut clients = self.clients.lock().await;
        if let Some(existing) = clients.get(callsign) {
            return existing.clone();
        }

        let token = match self.broker.acquire().await {
            Ok(token) => token,
            Err(error) => {
                warn!(%callsign, %error, "token unavailable, building unauthenticated client");
                None
            }
        };

        let client = Arc::new(ControlPlaneClient::new(&self.base_url, token.as_ref()));
        clients.insert(callsign.to_string(), client.clone());
        client
    }
}
