//! Isolated-context lifecycle.
//!
//! The correlator owns a small state machine over the context it talks to:
//!
//! ```text
//! NotLoaded ──> Loading ──> Loaded
//!                  │
//!                  └──────> Failed   (terminal, no retry)
//! ```
//!
//! Attaching the context itself is a platform concern, injected as the
//! [`ContextHost`] capability.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use assetlink_common::{ClientConfig, ClientError};

/// Fixed isolated-context identifier used outside multi-client mode.
pub const DEFAULT_CONTEXT_ID: &str = "assetlink-sandbox-frame";

/// Lifecycle state of the isolated context, as seen by the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// No isolated context exists.
    #[default]
    NotLoaded,
    /// A load is in flight.
    Loading,
    /// The context is reachable.
    Loaded,
    /// The load failed. Terminal for this context instance.
    Failed,
}

impl ContextState {
    /// Returns `true` if the context is reachable.
    pub fn is_loaded(self) -> bool {
        matches!(self, ContextState::Loaded)
    }
}

/// Errors from the platform capability hosting the isolated context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// The platform cannot host an isolated context at all.
    #[error("Platform cannot host an isolated context")]
    Unsupported,

    /// The context failed to become reachable.
    #[error("Context load failed: {reason}")]
    LoadFailed {
        /// Description of the load failure.
        reason: String,
    },
}

impl ContextError {
    /// Create a new `LoadFailed` error.
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }
}

/// Everything the platform needs to attach one isolated context.
#[derive(Debug, Clone)]
pub struct ContextDescriptor {
    /// Identifier of the embedded context element. Fixed by default;
    /// derived from the client identifier in multi-client mode.
    pub context_id: String,

    /// Location of the loadable sandbox resource, including the
    /// `clientId`, `debug`, and `telemetry` query parameters the sandbox
    /// bootstraps itself from.
    pub resource_url: Url,
}

impl ContextDescriptor {
    /// Build the descriptor for a client instance.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if the configured sandbox URL
    /// cannot be parsed.
    pub fn new(config: &ClientConfig, client_id: &str) -> Result<Self, ClientError> {
        let base = Url::parse(&config.sandbox_url).map_err(|e| {
            ClientError::invalid_config(format!("invalid sandbox url '{}': {e}", config.sandbox_url))
        })?;

        let mut resource_url = base
            .join(concat!(env!("CARGO_PKG_VERSION"), "/sandbox.html"))
            .map_err(|e| ClientError::invalid_config(format!("invalid sandbox url: {e}")))?;

        resource_url
            .query_pairs_mut()
            .append_pair("clientId", client_id)
            .append_pair("debug", if config.debug { "true" } else { "false" })
            .append_pair(
                "telemetry",
                if config.telemetry_enabled { "true" } else { "false" },
            );

        Ok(Self {
            context_id: context_id_for(config, client_id),
            resource_url,
        })
    }
}

/// Identifier of the embedded context element for a client instance.
pub fn context_id_for(config: &ClientConfig, client_id: &str) -> String {
    if config.multi_client {
        client_id.to_string()
    } else {
        DEFAULT_CONTEXT_ID.to_string()
    }
}

/// Platform capability that hosts the isolated context.
///
/// `attach` resolves when the platform reports the context loaded and
/// errors when it reports a load failure; the correlator drives its state
/// machine off that outcome.
#[async_trait]
pub trait ContextHost: Send + Sync {
    /// Whether this platform can host an isolated context at all.
    fn is_supported(&self) -> bool;

    /// Create and attach the isolated context, resolving on its load
    /// signal.
    async fn attach(&self, descriptor: &ContextDescriptor) -> Result<(), ContextError>;

    /// Remove the isolated context.
    fn detach(&self, context_id: &str);
}
