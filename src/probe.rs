//! Security-subsystem probe against the control plane's introspection URL.
//!
//! One HTTP GET tells us whether the controller has a `Security` subsystem
//! configured. This check is deliberately fail-open: if the controller
//! cannot confirm it, the caller proceeds unauthenticated rather than
//! blocking. The fail-closed side of the decision lives in [`crate::flags`].

use serde::Deserialize;
use tracing::{debug, warn};

/// Path of the controller configuration resource, relative to the base URL.
pub const CONTROLLER_CONFIG_PATH: &str = "/Service/Controller/Configuration/Controller";

/// Subsystem name indicating token-based security is configured.
const SECURITY_SUBSYSTEM: &str = "Security";

#[derive(Debug, Deserialize)]
struct ControllerConfiguration {
    #[serde(default)]
    subsystems: Vec<String>,
}

/// Probes the control plane for a configured `Security` subsystem.
#[derive(Debug, Clone)]
pub struct SecurityProbe {
    http: reqwest::Client,
    base_url: String,
}

impl SecurityProbe {
    /// Create a probe against the given base URL (e.g. `http://127.0.0.1:9998`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Issue the introspection GET and report whether the `Security`
    /// subsystem is present.
    ///
    /// Returns `true` only for a 200 response whose `subsystems` array
    /// contains the exact string `"Security"`. Transport errors, non-200
    /// statuses, and unparsable bodies all read as not configured.
    /// Redirects are followed.
    pub async fn is_security_subsystem_configured(&self) -> bool {
        let url = format!("{}{}", self.base_url, CONTROLLER_CONFIG_PATH);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "controller configuration probe failed");
                return false;
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(%status, "controller configuration probe returned non-200");
            return false;
        }

        match response.json::<ControllerConfiguration>().await {
            Ok(config) => {
                let configured = config
                    .subsystems
                    .iter()
                    .any(|subsystem| subsystem == SECURITY_SUBSYSTEM);
                debug!(
                    configured,
                    subsystems = config.subsystems.len(),
                    "controller configuration probed"
                );
                configured
            }
            Err(error) => {
                warn!(%error, "controller configuration body unparsable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config_route(body: &'static str, status: StatusCode) -> Router {
        Router::new().route(
            CONTROLLER_CONFIG_PATH,
            get(move || async move { (status, body).into_response() }),
        )
    }

    #[tokio::test]
    async fn test_security_subsystem_present() {
        let base = spawn(config_route(
            r#"{"subsystems":["Network","Security","Time"]}"#,
            StatusCode::OK,
        ))
        .await;
        let probe = SecurityProbe::new(base);
        assert!(probe.is_security_subsystem_configured().await);
    }

    #[tokio::test]
    async fn test_security_subsystem_absent() {
        let base = spawn(config_route(
            r#"{"subsystems":["Network","Time"]}"#,
            StatusCode::OK,
        ))
        .await;
        let probe = SecurityProbe::new(base);
        assert!(!probe.is_security_subsystem_configured().await);
    }

    #[tokio::test]
    async fn test_exact_match_required() {
        let base = spawn(config_route(
            r#"{"subsystems":["security","SecurityAgent"]}"#,
            StatusCode::OK,
        ))
        .await;
        let probe = SecurityProbe::new(base);
        assert!(!probe.is_security_subsystem_configured().await);
    }

    #[tokio::test]
    async fn test_non_200_reads_as_unconfigured() {
        let base = spawn(config_route(
            r#"{"subsystems":["Security"]}"#,
            StatusCode::SERVICE_UNAVAILABLE,
        ))
        .await;
        let probe = SecurityProbe::new(base);
        assert!(!probe.is_security_subsystem_configured().await);
    }

    #[tokio::test]
    async fn test_unparsable_body_reads_as_unconfigured() {
        let base = spawn(config_route("not json at all", StatusCode::OK)).await;
        let probe = SecurityProbe::new(base);
        assert!(!probe.is_security_subsystem_configured().await);
    }

    #[tokio::test]
    async fn test_missing_subsystems_field_reads_as_unconfigured() {
        let base = spawn(config_route(r#"{"other":true}"#, StatusCode::OK)).await;
        let probe = SecurityProbe::new(base);
        assert!(!probe.is_security_subsystem_configured().await);
    }

    #[tokio::test]
    async fn test_unreachable_controller_reads_as_unconfigured() {
        // Allocate a port that nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = SecurityProbe::new(format!("http://{}", addr));
        assert!(!probe.is_security_subsystem_configured().await);
    }
}
