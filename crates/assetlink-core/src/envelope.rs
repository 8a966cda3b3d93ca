//! The message envelope exchanged over the channel.
//!
//! Requests and responses are tagged unions over the closed operation set,
//! so dispatch on both sides is an exhaustive match rather than a lookup by
//! string event name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use assetlink_common::telemetry::{LogLevel, TelemetryEvent};
use assetlink_common::types::{
    AuthResponse, ChatToken, FileInfo, FileMetadata, ObjectRef, ViewContent, ViewStatus,
};
use assetlink_common::OperationName;

/// Outcome carried by a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    /// The operation succeeded; the payload carries its result.
    Success,
    /// The operation failed; the payload may carry failure metadata.
    Failure,
}

/// Payload of a request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "data")]
pub enum RequestBody {
    /// Authenticate the chat token.
    Authenticate {
        /// Token to authenticate.
        token: ChatToken,
    },
    /// Create an object slot for an attachment.
    CreateObject {
        /// Identifier granted read access to the object.
        id: String,
        /// The attachment to create a slot for.
        file: FileInfo,
        /// Credentials.
        token: ChatToken,
        /// Caller-supported image MIME types.
        supported_mime_types: Vec<String>,
    },
    /// Upload content into an object.
    UploadContent {
        /// Target object identifier.
        object_id: String,
        /// The attachment content.
        file: FileInfo,
        /// Credentials.
        token: ChatToken,
        /// Caller-supported image MIME types.
        supported_mime_types: Vec<String>,
    },
    /// Poll processing status.
    GetViewStatus {
        /// Metadata of the uploaded attachment.
        metadata: FileMetadata,
        /// Credentials.
        token: ChatToken,
        /// Caller-supported image MIME types.
        supported_mime_types: Vec<String>,
    },
    /// Download view content.
    GetView {
        /// Metadata of the uploaded attachment.
        metadata: FileMetadata,
        /// Location reported by the status operation.
        location: String,
        /// Credentials.
        token: ChatToken,
        /// Caller-supported image MIME types.
        supported_mime_types: Vec<String>,
    },
}

impl RequestBody {
    /// The operation this request carries.
    pub fn operation(&self) -> OperationName {
        match self {
            RequestBody::Authenticate { .. } => OperationName::Authenticate,
            RequestBody::CreateObject { .. } => OperationName::CreateObject,
            RequestBody::UploadContent { .. } => OperationName::UploadContent,
            RequestBody::GetViewStatus { .. } => OperationName::GetViewStatus,
            RequestBody::GetView { .. } => OperationName::GetView,
        }
    }
}

/// Payload of a response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "data")]
pub enum ResponseBody {
    /// The isolated context announced readiness.
    ContextLoaded,
    /// Result of `Authenticate`.
    Authenticated(AuthResponse),
    /// Result of `CreateObject`.
    ObjectCreated(ObjectRef),
    /// Result of `UploadContent`.
    ContentUploaded(FileMetadata),
    /// Result of `GetViewStatus`.
    ViewStatus(ViewStatus),
    /// Result of `GetView`.
    View(ViewContent),
    /// Telemetry event relayed from the isolated context.
    Telemetry {
        /// Severity of the relayed event.
        level: LogLevel,
        /// The relayed event.
        event: TelemetryEvent,
    },
    /// Failure metadata attached to a `Failure` response.
    Error {
        /// Description of the failure.
        message: String,
    },
}

/// Direction and correlation data of an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EnvelopeKind {
    /// A call from the host into the isolated context.
    Request {
        /// Token pairing this request with its eventual response.
        correlation_id: Uuid,
        /// The operation and its arguments.
        body: RequestBody,
    },
    /// An answer (or unsolicited announcement) from the isolated context.
    Response {
        /// The operation this response belongs to.
        operation: OperationName,
        /// Correlation token of the originating request; absent on
        /// announcements and telemetry.
        correlation_id: Option<Uuid>,
        /// Outcome of the operation.
        status: EventStatus,
        /// Result payload; present on success, optional failure metadata
        /// otherwise.
        body: Option<ResponseBody>,
    },
}

/// The wire unit exchanged over the message channel.
///
/// Constructed fresh per send; never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Identifier scoping which client/context pair this envelope belongs
    /// to.
    pub client_id: String,

    /// Runtime identifier of the sending client instance, when known.
    #[serde(default)]
    pub runtime_id: Option<String>,

    /// Direction, correlation, and payload.
    #[serde(flatten)]
    pub kind: EnvelopeKind,
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(
        client_id: impl Into<String>,
        runtime_id: impl Into<String>,
        correlation_id: Uuid,
        body: RequestBody,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            runtime_id: Some(runtime_id.into()),
            kind: EnvelopeKind::Request {
                correlation_id,
                body,
            },
        }
    }

    /// Build a response envelope.
    pub fn response(
        client_id: impl Into<String>,
        operation: OperationName,
        correlation_id: Option<Uuid>,
        status: EventStatus,
        body: Option<ResponseBody>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            runtime_id: None,
            kind: EnvelopeKind::Response {
                operation,
                correlation_id,
                status,
                body,
            },
        }
    }

    /// The operation this envelope carries.
    pub fn operation(&self) -> OperationName {
        match &self.kind {
            EnvelopeKind::Request { body, .. } => body.operation(),
            EnvelopeKind::Response { operation, .. } => *operation,
        }
    }
}
