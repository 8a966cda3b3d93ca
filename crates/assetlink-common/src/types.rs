//! Domain types exchanged with the asset service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Credentials and routing information for one chat conversation.
///
/// The token is forwarded to the asset service as-is; this crate performs
/// no authentication of its own.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatToken {
    /// Identifier of the chat conversation.
    pub chat_id: String,

    /// Bearer token issued for the conversation.
    pub token: String,

    /// Explicit asset-service endpoint, if the issuer pinned one.
    #[serde(default)]
    pub service_endpoint: Option<String>,

    /// Regional endpoint map; the `assets` entry is used as a fallback
    /// when no explicit endpoint is set.
    #[serde(default)]
    pub region_endpoints: HashMap<String, String>,

    /// Token lifetime as reported by the issuer.
    #[serde(default)]
    pub expires_in: Option<String>,

    /// Visitor identifier, when the conversation has one.
    #[serde(default)]
    pub visitor_id: Option<String>,
}

impl ChatToken {
    /// Resolve the asset-service endpoint for this token.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EndpointMissing`] if neither an explicit
    /// endpoint nor a regional `assets` entry is present.
    pub fn endpoint(&self) -> Result<&str, ServiceError> {
        if let Some(endpoint) = self.service_endpoint.as_deref() {
            return Ok(endpoint);
        }
        self.region_endpoints
            .get("assets")
            .map(String::as_str)
            .ok_or(ServiceError::EndpointMissing)
    }
}

/// An attachment file handed to the client for upload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileInfo {
    /// File name, including extension.
    pub name: String,

    /// MIME type reported by the host page.
    pub mime_type: String,

    /// Size in bytes.
    pub size: u64,

    /// Raw content.
    #[serde(default)]
    pub bytes: Vec<u8>,
}

/// Metadata describing an uploaded attachment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileMetadata {
    /// Object identifier assigned by the asset service.
    pub id: String,

    /// Original file name.
    pub name: String,

    /// MIME type.
    pub mime_type: String,

    /// Size in bytes.
    pub size: u64,

    /// Content URL the upload was performed against.
    pub url: String,

    /// File-sharing protocol marker (0 = asset-service based sharing).
    #[serde(default)]
    pub sharing_protocol: u32,
}

/// Processing state of stored content or a view of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    /// Ready to serve.
    Ready,
    /// Still being processed.
    InProgress,
    /// Processing failed.
    Failed,
    /// Content has expired.
    Expired,
    /// Content was flagged as malware.
    Malware,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Response of the view-status operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewStatus {
    /// State of the stored content.
    pub content_state: ContentState,

    /// State of the requested view, when reported.
    #[serde(default)]
    pub view_state: Option<ContentState>,

    /// Location the view can be downloaded from.
    pub view_location: String,

    /// Location for subsequent status polls, when reported.
    #[serde(default)]
    pub status_location: Option<String>,

    /// Full content length in bytes, when reported.
    #[serde(default)]
    pub content_length: Option<u64>,

    /// View length in bytes, when reported.
    #[serde(default)]
    pub view_length: Option<u64>,
}

/// Reference to an object created on the asset service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectRef {
    /// Object identifier.
    pub id: String,
}

/// Result of the authenticate operation.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AuthResponse {
    /// HTTP status returned by the auth endpoint.
    pub status: u16,
}

/// Downloaded view content.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ViewContent {
    /// MIME type reported by the service.
    pub content_type: String,

    /// Raw content.
    pub bytes: Vec<u8>,
}
