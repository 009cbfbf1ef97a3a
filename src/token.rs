//! Process-wide security-token brokering.
//!
//! The control plane authorizes calls with an opaque token handed out by a
//! platform secret primitive. Whether a token is needed at all depends on a
//! feature flag and on the controller reporting a `Security` subsystem; both
//! checks are expensive enough (and stable enough) that the answer is
//! computed once per process and cached forever.
//!
//! The required/not-required *decision* is permanent. The token *value* is
//! cached separately: a failed retrieval leaves the decision in place but is
//! retried on the next call instead of pinning "no token" for the rest of
//! the process.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::flags::{self, FlagStore};
use crate::probe::SecurityProbe;

/// Buffer capacity handed to the platform secret primitive, and the upper
/// bound on token length.
pub const TOKEN_BUFFER_CAPACITY: usize = 2048;

/// Token acquisition errors.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// The platform primitive reported a failure status.
    #[error("secret retrieval failed with status {status}")]
    Retrieval { status: i32 },

    /// The primitive returned bytes that do not form a usable token.
    #[error("retrieved token is malformed: {reason}")]
    Malformed { reason: String },
}

/// Seam over the platform secret-retrieval primitive.
///
/// The primitive fills a fixed-capacity buffer; a negative platform status
/// maps to [`TokenError::Retrieval`]. Implementations are assumed bounded
/// in time by the platform, so no timeout is applied here.
pub trait SecretRetriever: Send + Sync {
    fn retrieve(&self, capacity: usize) -> Result<Vec<u8>, TokenError>;
}

/// Opaque secret credential for the control plane.
///
/// Zeroized on drop. `Debug` never reveals the value; the raw string is only
/// reachable through [`SecurityToken::expose`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecurityToken(String);

impl SecurityToken {
    /// Build a token from a platform buffer, trimming trailing NUL padding.
    fn from_buffer(bytes: &[u8]) -> Result<Self, TokenError> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        if end > TOKEN_BUFFER_CAPACITY {
            return Err(TokenError::Malformed {
                reason: format!("{} bytes exceeds capacity {}", end, TOKEN_BUFFER_CAPACITY),
            });
        }
        let value = std::str::from_utf8(&bytes[..end])
            .map_err(|_| TokenError::Malformed {
                reason: "not valid UTF-8".to_string(),
            })?
            .to_string();
        Ok(Self(value))
    }

    #[cfg(test)]
    pub(crate) fn from_test_value(value: &str) -> Self {
        Self(value.to_string())
    }

    /// The raw token value, for embedding in a connection target.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityToken(len={})", self.0.len())
    }
}

/// Terminal decision about whether a token is needed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Unresolved,
    NotRequired,
    Required,
}

struct BrokerState {
    decision: Decision,
    token: Option<SecurityToken>,
}

/// Compute-once broker for the process's security token.
///
/// The mutex spans the entire decide-and-populate sequence, including the
/// flag read, the HTTP probe, and the secret retrieval. First-time
/// initialization therefore serializes concurrent callers; every later call
/// takes the fast path without touching the network or the config store.
///
/// Construct one per process and inject it into dependents instead of
/// reaching for ambient global state.
pub struct TokenBroker {
    state: Mutex<BrokerState>,
    flags: Arc<dyn FlagStore>,
    probe: SecurityProbe,
    retriever: Arc<dyn SecretRetriever>,
}

impl TokenBroker {
    pub fn new(
        flags: Arc<dyn FlagStore>,
        probe: SecurityProbe,
        retriever: Arc<dyn SecretRetriever>,
    ) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                decision: Decision::Unresolved,
                token: None,
            }),
            flags,
            probe,
            retriever,
        }
    }

    /// Acquire the process token.
    ///
    /// `Ok(None)` means security is not enforced and calls go out
    /// unauthenticated; that answer is cached for the process lifetime.
    /// `Err` means enforcement is on but the platform refused to hand out a
    /// token; the decision stays cached and only the retrieval is retried
    /// on the next call.
    pub async fn acquire(&self) -> Result<Option<SecurityToken>, TokenError> {
        let mut state = self.state.lock().await;

        match state.decision {
            Decision::NotRequired => return Ok(None),
            Decision::Required => {
                if let Some(token) = &state.token {
                    return Ok(Some(token.clone()));
                }
            }
            Decision::Unresolved => {
                if !flags::security_enforcement_enabled(self.flags.as_ref()) {
                    info!("security enforcement disabled, token not required");
                    state.decision = Decision::NotRequired;
                    return Ok(None);
                }
                // The flag check gates the probe: when enforcement is off
                // the controller is never contacted.
                if !self.probe.is_security_subsystem_configured().await {
                    info!("security subsystem not configured, token not required");
                    state.decision = Decision::NotRequired;
                    return Ok(None);
                }
                state.decision = Decision::Required;
            }
        }

        match self.retriever.retrieve(TOKEN_BUFFER_CAPACITY) {
            Ok(bytes) => {
                let token = SecurityToken::from_buffer(&bytes)?;
                debug!(token = ?token, "security token retrieved");
                state.token = Some(token.clone());
                Ok(Some(token))
            }
            Err(error) => {
                warn!(%error, "security token retrieval failed");
                Err(error)
            }
        }
    }
}
