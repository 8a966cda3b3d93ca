//! The closed set of operations exchanged over the message channel.

use serde::{Deserialize, Serialize};

/// Name of an operation carried by a message envelope.
///
/// This is a closed enumeration: both the correlator and the dispatcher
/// match on it exhaustively, so adding an operation is a compile-time
/// checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationName {
    /// Readiness announcement from the isolated context.
    ContextLoaded,
    /// Token authentication against the asset service.
    Authenticate,
    /// Creation of an object slot for an attachment.
    CreateObject,
    /// Upload of attachment content into an object.
    UploadContent,
    /// Processing-status poll for an uploaded attachment.
    GetViewStatus,
    /// Download of attachment view content.
    GetView,
    /// Telemetry event relayed from the isolated context.
    SendTelemetry,
}

impl std::fmt::Display for OperationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationName::ContextLoaded => write!(f, "ContextLoaded"),
            OperationName::Authenticate => write!(f, "Authenticate"),
            OperationName::CreateObject => write!(f, "CreateObject"),
            OperationName::UploadContent => write!(f, "UploadContent"),
            OperationName::GetViewStatus => write!(f, "GetViewStatus"),
            OperationName::GetView => write!(f, "GetView"),
            OperationName::SendTelemetry => write!(f, "SendTelemetry"),
        }
    }
}
