//! Feature-flag reads against the host configuration store.
//!
//! The store itself is an external collaborator (a device-wide parameter
//! service); this module defines the seam and the fail-closed reading of the
//! security-enforcement flag. A missing or unreadable flag must never be
//! interpreted as "security off".

use tracing::{debug, warn};

/// Component name used for parameter lookups against the host store.
pub const FLAG_COMPONENT: &str = "RDKShell";

/// Fully-qualified parameter controlling security enforcement.
pub const SECURITY_ENFORCEMENT_FLAG: &str =
    "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.ThunderSecurity.Enable";

/// Type tag reported by the configuration store alongside a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    Boolean,
    Integer,
    String,
    Unknown,
}

/// A parameter answer from the configuration store.
///
/// The store reports values as strings with a separate type tag; an explicit
/// default answer is indistinguishable from a stored one at this level.
#[derive(Debug, Clone)]
pub struct FlagValue {
    pub value_type: FlagType,
    pub value: String,
}

impl FlagValue {
    /// A boolean-typed answer, as the store would report it.
    pub fn boolean(value: bool) -> Self {
        Self {
            value_type: FlagType::Boolean,
            value: value.to_string(),
        }
    }

    /// Boolean reading of the value. `None` when the type tag is not
    /// boolean or the value string is not a recognizable boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if self.value_type != FlagType::Boolean {
            return None;
        }
        if self.value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if self.value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

/// Seam over the external configuration store.
///
/// `read` returns `Some` whenever the store answered, including with an
/// explicit default; `None` on store failure or an undefined parameter.
/// Implementations must not block for unbounded time.
pub trait FlagStore: Send + Sync {
    fn read(&self, component: &str, parameter: &str) -> Option<FlagValue>;
}

/// Whether security enforcement is enabled according to the store.
///
/// Fail-closed: an unreadable, non-boolean, or garbled answer counts as
/// enabled, so callers cannot silently skip token acquisition.
pub fn security_enforcement_enabled(store: &dyn FlagStore) -> bool {
    match store.read(FLAG_COMPONENT, SECURITY_ENFORCEMENT_FLAG) {
        Some(answer) => {
            let enabled = answer.as_bool().unwrap_or(true);
            debug!(enabled, "security enforcement flag read");
            enabled
        }
        None => {
            warn!("security enforcement flag unreadable, assuming enforced");
            true
        }
    }
}
