//! Sandbox-side bootstrap for assetlink isolated contexts.
//!
//! The host loads the sandbox resource with `clientId`, `debug`, and
//! `telemetry` query parameters; this crate parses them
//! ([`SandboxConfig`]) and wires a dispatcher to the message channel and
//! the REST client ([`run_sandbox`]).

pub mod bootstrap;
pub mod runtime;

pub use bootstrap::SandboxConfig;
pub use runtime::{run_sandbox, run_sandbox_with_service};
