//! Error types for assetlink.
//!
//! This module defines two error hierarchies using `thiserror`:
//! - [`ServiceError`]: failures from the asset-service REST calls
//! - [`ClientError`]: failures surfaced by the client (direct or isolated)
//!
//! Errors never cross the message channel as native values; the dispatcher
//! converts them into `Failure` response envelopes and the correlator
//! rebuilds a [`ClientError`] on the host side.

use thiserror::Error;

use crate::operation::OperationName;

/// Failures from the asset-service REST operations.
///
/// Each of the five operations fails with its own named variant so that a
/// caller (or a telemetry pipeline) can tell them apart without string
/// matching.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Token authentication was rejected or could not be performed.
    #[error("Token authentication failed: {reason}")]
    AuthenticationFailed {
        /// Description of the authentication failure.
        reason: String,
    },

    /// Object creation failed.
    #[error("Object creation failed: {reason}")]
    CreateObjectFailed {
        /// Description of the creation failure.
        reason: String,
    },

    /// Content upload failed.
    #[error("Content upload failed: {reason}")]
    UploadContentFailed {
        /// Description of the upload failure.
        reason: String,
    },

    /// View status could not be fetched.
    #[error("View status fetch failed: {reason}")]
    ViewStatusFailed {
        /// Description of the status failure.
        reason: String,
    },

    /// View content could not be fetched.
    #[error("View fetch failed: {reason}")]
    ViewFailed {
        /// Description of the view failure.
        reason: String,
    },

    /// The status response did not carry a view location.
    #[error("View location missing from status response")]
    ViewLocationMissing,

    /// The stored content has expired and cannot be viewed.
    #[error("Content has expired")]
    ContentExpired,

    /// No asset-service endpoint is configured on the chat token.
    #[error("No asset service endpoint configured")]
    EndpointMissing,
}

impl ServiceError {
    /// Create a new `AuthenticationFailed` error.
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `CreateObjectFailed` error.
    pub fn create_object_failed(reason: impl Into<String>) -> Self {
        Self::CreateObjectFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `UploadContentFailed` error.
    pub fn upload_content_failed(reason: impl Into<String>) -> Self {
        Self::UploadContentFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `ViewStatusFailed` error.
    pub fn view_status_failed(reason: impl Into<String>) -> Self {
        Self::ViewStatusFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `ViewFailed` error.
    pub fn view_failed(reason: impl Into<String>) -> Self {
        Self::ViewFailed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates expired content.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::ContentExpired)
    }
}

/// Failures surfaced to users of the attachment client.
///
/// The variants follow the failure taxonomy of the isolation protocol:
/// platform incompatibility, context load failure, per-operation dispatch
/// failure, and lifecycle conditions (`Disposed`, `ChannelClosed`,
/// `ResponseTimeout`).
#[derive(Error, Debug)]
pub enum ClientError {
    /// Isolated mode was requested on a platform that cannot host the
    /// sandboxed context.
    #[error("Isolated mode requested on a platform that cannot host it")]
    PlatformUnsupported,

    /// The isolated context failed to become reachable.
    ///
    /// Terminal for that context instance; the client does not retry.
    #[error("Isolated context failed to load: {reason}")]
    ContextLoadFailed {
        /// Description of the load failure.
        reason: String,
    },

    /// An operation failed, either in-process or inside the isolated
    /// context.
    #[error("{operation} failed: {reason}")]
    OperationFailed {
        /// The operation that failed.
        operation: OperationName,
        /// Description of the failure.
        reason: String,
    },

    /// The client was disposed while the request was still in flight.
    #[error("Client disposed with the request in flight")]
    Disposed,

    /// The message channel to the isolated context is closed.
    #[error("Message channel closed")]
    ChannelClosed,

    /// No response arrived within the configured timeout.
    #[error("No response within {timeout_ms}ms")]
    ResponseTimeout {
        /// The timeout in milliseconds.
        timeout_ms: u64,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A direct (non-isolated) asset-service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ClientError {
    /// Create a new `ContextLoadFailed` error.
    pub fn context_load_failed(reason: impl Into<String>) -> Self {
        Self::ContextLoadFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `OperationFailed` error.
    pub fn operation_failed(operation: OperationName, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation,
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates the client was disposed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns `true` if this error indicates the platform cannot host the
    /// isolated context.
    pub fn is_platform_unsupported(&self) -> bool {
        matches!(self, Self::PlatformUnsupported)
    }

    /// Returns `true` if this error is terminal for the context instance
    /// (platform incompatibility or a failed load).
    pub fn is_context_failure(&self) -> bool {
        matches!(
            self,
            Self::PlatformUnsupported | Self::ContextLoadFailed { .. }
        )
    }
}
