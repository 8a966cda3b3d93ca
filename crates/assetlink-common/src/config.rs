//! Configuration for the attachment client.
//!
//! [`ClientConfig`] is created once and threaded through constructors; there
//! is no process-wide mutable configuration. It can be loaded from files
//! (JSON) or built in code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attachment client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Run asset-service calls inside an isolated context.
    ///
    /// When disabled, calls are performed in-process by the direct client.
    #[serde(default)]
    pub isolated: bool,

    /// Derive the isolated-context identifier from the client identifier.
    ///
    /// Allows multiple independent client instances (each with its own
    /// isolated context) to coexist on one host page without collision.
    #[serde(default)]
    pub multi_client: bool,

    /// Emit verbose protocol diagnostics.
    #[serde(default)]
    pub debug: bool,

    /// Transmit telemetry events from the isolated context to the host.
    ///
    /// When disabled, scenario events are still generated inside the
    /// sandbox but never cross the channel.
    #[serde(default = "defaults::telemetry_enabled")]
    pub telemetry_enabled: bool,

    /// Base location of the isolated context's loadable resource.
    ///
    /// Required when `isolated` is enabled.
    #[serde(default)]
    pub sandbox_url: String,

    /// Optional bound on the wait for a matching response, in milliseconds.
    ///
    /// Unset by default: a request whose response never arrives stays
    /// pending until the client is disposed.
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            isolated: false,
            multi_client: false,
            debug: false,
            telemetry_enabled: defaults::telemetry_enabled(),
            sandbox_url: String::new(),
            response_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Get the response timeout as a `Duration`, if one is configured.
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn telemetry_enabled() -> bool {
        true
    }
}
