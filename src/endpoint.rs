//! Control-endpoint discovery from the host process manager's config file.
//!
//! The host process manager writes its listening address into a JSON config
//! file (`binding` and `port` fields). When that file is missing or
//! incomplete we fall back to the historical hardcoded address rather than
//! failing, since most deployments still use it.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

/// Fallback socket address for the control plane.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:9998";

/// Default location of the host process manager's configuration file.
pub const HOST_CONFIG_PATH: &str = "/etc/WPEFramework/config.json";

#[derive(Debug, Deserialize)]
struct HostConfig {
    binding: Option<String>,
    port: Option<u16>,
}

/// Resolve the control plane's `ip:port` from the host config file.
///
/// Falls back to [`DEFAULT_ENDPOINT`] when the file does not exist, cannot
/// be parsed, or lacks either field.
pub fn discover_endpoint(config_path: impl AsRef<Path>) -> String {
    let path = config_path.as_ref();

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            warn!(path = %path.display(), %error, "host config unreadable, using default endpoint");
            return DEFAULT_ENDPOINT.to_string();
        }
    };

    let config: HostConfig = match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(error) => {
            warn!(path = %path.display(), %error, "host config unparsable, using default endpoint");
            return DEFAULT_ENDPOINT.to_string();
        }
    };

    match (config.binding, config.port) {
        (Some(binding), Some(port)) => {
            let endpoint = format!("{}:{}", binding, port);
            debug!(%endpoint, "control endpoint discovered from host config");
            endpoint
        }
        _ => {
            warn!(path = %path.display(), "host config missing binding or port, using default endpoint");
            DEFAULT_ENDPOINT.to_string()
        }
    }
}

/// Base HTTP URL for the control plane, derived from [`discover_endpoint`].
pub fn discover_base_url(config_path: impl AsRef<Path>) -> String {
    format!("http://{}", discover_endpoint(config_path))
}
