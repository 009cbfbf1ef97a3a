//! Idempotent plugin-activation orchestration.
//!
//! The control plane's idempotency for `activate` is unspecified, so the
//! orchestrator always checks the current state first and only activates
//! when the plugin is not already running. Activation state is never cached
//! here: plugin lifecycle changes over time, so every question goes to the
//! controller.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{ClientError, ClientRegistry};

/// Lifecycle state literal the control plane reports for a running plugin.
const ACTIVATED_STATE: &str = "ACTIVATED";

/// Activation state of a plugin as reported by the control plane.
///
/// `Unknown` is distinct from `Inactive`: a transport failure does not
/// confirm the plugin is down, and callers that care (health reporting,
/// retry policy) can tell the two apart.
#[derive(Debug, Clone)]
pub enum ActivationStatus {
    Active,
    Inactive,
    /// The state could not be determined.
    Unknown(ClientError),
}

impl ActivationStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ActivationStatus::Active)
    }
}

/// Outcome of [`ActivationOrchestrator::ensure_activated`].
///
/// RPC failures never escape as errors; they land in the outcome and the
/// logs, and a later status query is the way to learn whether the plugin
/// actually came up.
#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    /// The plugin was already active; no activate call was issued.
    AlreadyActive,
    /// An activate call was issued and accepted. Post-activation state is
    /// not verified.
    ActivationRequested,
    /// An activate call was issued and failed.
    ActivationFailed(ClientError),
    /// The callsign was empty; nothing was sent.
    InvalidCallsign,
}

#[derive(Debug, Deserialize)]
struct ServiceStatus {
    #[serde(alias = "JSONState", default)]
    state: String,
}

/// Orchestrates check-before-act plugin activation against the control plane.
pub struct ActivationOrchestrator {
    registry: Arc<ClientRegistry>,
}

impl ActivationOrchestrator {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Query the current activation state of `callsign`.
    ///
    /// Never returns an error: failures come back as
    /// [`ActivationStatus::Unknown`] with a warn log.
    pub async fn status(&self, callsign: &str) -> ActivationStatus {
        if callsign.is_empty() {
            warn!("activation status requested for empty callsign");
            return ActivationStatus::Unknown(ClientError::InvalidCallsign);
        }

        let client = self.registry.client(callsign).await;
        let method = format!("status@{}", callsign);

        match client.invoke(&method, Value::Null).await {
            Ok(result) => Self::parse_status(callsign, result),
            Err(error) => {
                warn!(%callsign, %error, "activation status query failed");
                ActivationStatus::Unknown(error)
            }
        }
    }

    fn parse_status(callsign: &str, result: Value) -> ActivationStatus {
        let services: Vec<ServiceStatus> = match serde_json::from_value(result) {
            Ok(services) => services,
            Err(error) => {
                warn!(%callsign, %error, "malformed status response");
                return ActivationStatus::Unknown(ClientError::MalformedResponse(
                    error.to_string(),
                ));
            }
        };

        match services.first() {
            Some(service) if service.state == ACTIVATED_STATE => {
                info!(%callsign, "plugin is active");
                ActivationStatus::Active
            }
            Some(service) => {
                info!(%callsign, state = %service.state, "plugin is not active");
                ActivationStatus::Inactive
            }
            None => {
                warn!(%callsign, "status response contained no services");
                ActivationStatus::Unknown(ClientError::MalformedResponse(
                    "empty service list".to_string(),
                ))
            }
        }
    }

    /// Activate `callsign` unless a status check says it already is.
    ///
    /// An `Unknown` status is treated as not active, so exactly one
    /// activate call goes out whenever the controller does not confirm the
    /// plugin is up. The request and response are logged regardless of
    /// outcome.
    pub async fn ensure_activated(&self, callsign: &str) -> ActivationOutcome {
        if callsign.is_empty() {
            warn!("activation requested for empty callsign");
            return ActivationOutcome::InvalidCallsign;
        }

        if self.status(callsign).await.is_active() {
            return ActivationOutcome::AlreadyActive;
        }

        let client = self.registry.client(callsign).await;
        let params = json!({ "callsign": callsign });
        info!(%callsign, "activating plugin");

        match client.invoke("activate", params.clone()).await {
            Ok(result) => {
                info!(%callsign, params = %params, result = %result, "activate call completed");
                ActivationOutcome::ActivationRequested
            }
            Err(error) => {
                warn!(%callsign, params = %params, %error, "activate call failed");
                ActivationOutcome::ActivationFailed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_activated() {
        let status = ActivationOrchestrator::parse_status(
            "WebKitBrowser",
            json!([{ "state": "ACTIVATED" }]),
        );
        assert!(status.is_active());
    }

    #[test]
    fn test_parse_status_accepts_legacy_field_name() {
        let status = ActivationOrchestrator::parse_status(
            "WebKitBrowser",
            json!([{ "JSONState": "ACTIVATED" }]),
        );
        assert!(status.is_active());
    }

    #[test]
    fn test_parse_status_deactivated() {
        let status =
            ActivationOrchestrator::parse_status("Netflix", json!([{ "state": "DEACTIVATED" }]));
        assert!(matches!(status, ActivationStatus::Inactive));
    }

    #[test]
    fn test_parse_status_only_first_element_counts() {
        let status = ActivationOrchestrator::parse_status(
            "Netflix",
            json!([{ "state": "DEACTIVATED" }, { "state": "ACTIVATED" }]),
        );
        assert!(matches!(status, ActivationStatus::Inactive));
    }

    #[test]
    fn test_parse_status_empty_array_is_unknown() {
        let status = ActivationOrchestrator::parse_status("Netflix", json!([]));
        assert!(matches!(
            status,
            ActivationStatus::Unknown(ClientError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_status_non_array_is_unknown() {
        let status = ActivationOrchestrator::parse_status("Netflix", json!({"state": "ACTIVATED"}));
        assert!(matches!(
            status,
            ActivationStatus::Unknown(ClientError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_status_is_case_sensitive() {
        let status =
            ActivationOrchestrator::parse_status("Netflix", json!([{ "state": "activated" }]));
        assert!(matches!(status, ActivationStatus::Inactive));
    }
}
