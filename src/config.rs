//! Crate configuration.
//!
//! Small by design: the RPC timeout and flag component are fixed by the
//! control plane's contract, so the only knobs are where the control plane
//! lives and where to look when it has to be discovered.

use std::path::PathBuf;

use serde::Deserialize;

use crate::endpoint;

/// Configuration for connecting to the control plane.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    /// Base URL of the control plane. When unset, the endpoint is
    /// discovered from the host config file.
    pub base_url: Option<String>,

    /// Host process manager config file used for endpoint discovery.
    pub host_config_path: PathBuf,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            host_config_path: PathBuf::from(endpoint::HOST_CONFIG_PATH),
        }
    }
}

impl ControlPlaneConfig {
    /// A config pinned to an explicit base URL, skipping discovery.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// The base URL all control-plane traffic goes to.
    pub fn resolve_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => endpoint::discover_base_url(&self.host_config_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_base_url_wins() {
        let config = ControlPlaneConfig::with_base_url("http://127.0.0.1:12345/");
        assert_eq!(config.resolve_base_url(), "http://127.0.0.1:12345");
    }

    #[test]
    fn test_default_discovers_from_host_config() {
        // No host config file in the test environment, so discovery lands
        // on the fallback endpoint.
        let config = ControlPlaneConfig {
            host_config_path: PathBuf::from("/nonexistent/config.json"),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_base_url(),
            format!("http://{}", endpoint::DEFAULT_ENDPOINT)
        );
    }

    #[test]
    fn test_deserializes_from_json() {
        let config: ControlPlaneConfig =
            serde_json::from_str(r#"{"baseUrl":"http://10.0.0.5:9998"}"#).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://10.0.0.5:9998"));
        assert_eq!(
            config.host_config_path,
            PathBuf::from(endpoint::HOST_CONFIG_PATH)
        );
    }
}
