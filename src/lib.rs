//! conductor — client library for a local plugin control plane.
//!
//! Service plugins running inside a host process manager use this crate to
//! talk to the local control-plane service: acquire the process-wide
//! security token (computed once, guarded against concurrent callers) and
//! make sure named plugins are activated without issuing duplicate activate
//! calls.
//!
//! The platform seams ([`flags::FlagStore`] for the device configuration
//! store, [`token::SecretRetriever`] for the secret primitive) are traits
//! injected at construction, so everything here is testable against fakes.

pub mod activation;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod flags;
pub mod logging;
pub mod probe;
pub mod token;

use std::sync::Arc;

pub use activation::{ActivationOrchestrator, ActivationOutcome, ActivationStatus};
pub use client::{ClientError, ClientRegistry, ControlPlaneClient, RPC_TIMEOUT};
pub use config::ControlPlaneConfig;
pub use flags::{FlagStore, FlagValue};
pub use probe::SecurityProbe;
pub use token::{SecretRetriever, SecurityToken, TokenBroker, TokenError};

/// The control-plane subsystem, wired together.
///
/// Owns the token broker, the client registry, and the activation
/// orchestrator; build one per process and share it across plugin
/// instances.
pub struct Conductor {
    broker: Arc<TokenBroker>,
    registry: Arc<ClientRegistry>,
    orchestrator: ActivationOrchestrator,
}

impl Conductor {
    pub fn new(
        config: &ControlPlaneConfig,
        flags: Arc<dyn FlagStore>,
        retriever: Arc<dyn SecretRetriever>,
    ) -> Self {
        let base_url = config.resolve_base_url();
        let probe = SecurityProbe::new(&base_url);
        let broker = Arc::new(TokenBroker::new(flags, probe, retriever));
        let registry = Arc::new(ClientRegistry::new(&base_url, broker.clone()));
        let orchestrator = ActivationOrchestrator::new(registry.clone());
        Self {
            broker,
            registry,
            orchestrator,
        }
    }

    /// The process-wide token broker.
    pub fn tokens(&self) -> &Arc<TokenBroker> {
        &self.broker
    }

    /// The per-callsign client registry.
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// The activation orchestrator.
    pub fn activation(&self) -> &ActivationOrchestrator {
        &self.orchestrator
    }
}
