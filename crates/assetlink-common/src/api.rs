//! The asset-service collaborator trait.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::{AuthResponse, ChatToken, FileInfo, FileMetadata, ObjectRef, ViewContent, ViewStatus};

/// The five asset-service operations.
///
/// Implemented by the REST client against the real service, and by stubs in
/// tests. The direct client calls this in-process; in isolated mode the
/// dispatcher calls it from inside the sandboxed context.
#[async_trait]
pub trait AssetApi: Send + Sync {
    /// Authenticate the chat token with the asset service.
    async fn authenticate(&self, token: &ChatToken) -> Result<AuthResponse, ServiceError>;

    /// Create an object slot for an attachment, readable by `id`.
    async fn create_object(
        &self,
        id: &str,
        file: &FileInfo,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ObjectRef, ServiceError>;

    /// Upload attachment content into a previously created object.
    async fn upload_content(
        &self,
        object_id: &str,
        file: &FileInfo,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<FileMetadata, ServiceError>;

    /// Poll the processing status of an uploaded attachment.
    async fn get_view_status(
        &self,
        metadata: &FileMetadata,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewStatus, ServiceError>;

    /// Download attachment view content from the reported location.
    async fn get_view(
        &self,
        metadata: &FileMetadata,
        location: &str,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewContent, ServiceError>;
}
