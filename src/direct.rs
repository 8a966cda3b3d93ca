//! The non-isolated client variant.
//!
//! [`DirectClient`] invokes the asset-service collaborator in-process; no
//! correlation is needed. Each operation is bracketed with scenario
//! telemetry when a logger is attached.

use std::sync::Arc;

use uuid::Uuid;

use assetlink_common::telemetry::{EventLogger, ScenarioMarker, TelemetryProps};
use assetlink_common::types::{
    AuthResponse, ChatToken, FileInfo, FileMetadata, ObjectRef, ViewContent, ViewStatus,
};
use assetlink_common::{AssetApi, ClientError, OperationName};

/// In-process attachment client.
pub struct DirectClient {
    runtime_id: String,
    api: Arc<dyn AssetApi>,
    marker: Option<ScenarioMarker>,
}

impl DirectClient {
    /// Create a direct client over the given collaborator.
    ///
    /// Telemetry is emitted only when a logger is provided.
    pub fn new(api: Arc<dyn AssetApi>, logger: Option<Arc<dyn EventLogger>>) -> Self {
        let runtime_id = Uuid::new_v4().to_string();
        let marker =
            logger.map(|logger| ScenarioMarker::new(logger).with_runtime_id(runtime_id.clone()));

        Self {
            runtime_id,
            api,
            marker,
        }
    }

    /// Runtime identifier of this client instance.
    pub fn runtime_id(&self) -> &str {
        &self.runtime_id
    }

    /// Authenticate the chat token.
    pub async fn authenticate(&self, token: &ChatToken) -> Result<AuthResponse, ClientError> {
        let props = chat_props(token);
        self.start(OperationName::Authenticate, props.clone());

        match self.api.authenticate(token).await {
            Ok(response) => {
                self.complete(OperationName::Authenticate, props);
                Ok(response)
            }
            Err(err) => {
                self.fail(OperationName::Authenticate, props, &err.to_string());
                Err(err.into())
            }
        }
    }

    /// Create an object slot for an attachment.
    pub async fn create_object(
        &self,
        id: &str,
        file: &FileInfo,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ObjectRef, ClientError> {
        let mut props = chat_props(token);
        props.insert("mimeType".into(), file.mime_type.clone().into());
        self.start(OperationName::CreateObject, props.clone());

        match self
            .api
            .create_object(id, file, token, supported_mime_types)
            .await
        {
            Ok(object) => {
                props.insert("documentId".into(), object.id.clone().into());
                self.complete(OperationName::CreateObject, props);
                Ok(object)
            }
            Err(err) => {
                self.fail(OperationName::CreateObject, props, &err.to_string());
                Err(err.into())
            }
        }
    }

    /// Upload attachment content into a previously created object.
    pub async fn upload_content(
        &self,
        object_id: &str,
        file: &FileInfo,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<FileMetadata, ClientError> {
        let mut props = chat_props(token);
        props.insert("documentId".into(), object_id.into());
        props.insert("mimeType".into(), file.mime_type.clone().into());
        self.start(OperationName::UploadContent, props.clone());

        match self
            .api
            .upload_content(object_id, file, token, supported_mime_types)
            .await
        {
            Ok(metadata) => {
                self.complete(OperationName::UploadContent, props);
                Ok(metadata)
            }
            Err(err) => {
                self.fail(OperationName::UploadContent, props, &err.to_string());
                Err(err.into())
            }
        }
    }

    /// Poll the processing status of an uploaded attachment.
    pub async fn get_view_status(
        &self,
        metadata: &FileMetadata,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewStatus, ClientError> {
        let mut props = chat_props(token);
        props.insert("documentId".into(), metadata.id.clone().into());
        self.start(OperationName::GetViewStatus, props.clone());

        match self
            .api
            .get_view_status(metadata, token, supported_mime_types)
            .await
        {
            Ok(status) => {
                self.complete(OperationName::GetViewStatus, props);
                Ok(status)
            }
            Err(err) => {
                self.fail(OperationName::GetViewStatus, props, &err.to_string());
                Err(err.into())
            }
        }
    }

    /// Download attachment view content.
    pub async fn get_view(
        &self,
        metadata: &FileMetadata,
        location: &str,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewContent, ClientError> {
        let mut props = chat_props(token);
        props.insert("documentId".into(), metadata.id.clone().into());
        self.start(OperationName::GetView, props.clone());

        match self
            .api
            .get_view(metadata, location, token, supported_mime_types)
            .await
        {
            Ok(content) => {
                self.complete(OperationName::GetView, props);
                Ok(content)
            }
            Err(err) => {
                self.fail(OperationName::GetView, props, &err.to_string());
                Err(err.into())
            }
        }
    }

    fn start(&self, operation: OperationName, props: TelemetryProps) {
        if let Some(marker) = &self.marker {
            marker.start_scenario(operation, props);
        }
    }

    fn complete(&self, operation: OperationName, props: TelemetryProps) {
        if let Some(marker) = &self.marker {
            marker.complete_scenario(operation, props);
        }
    }

    fn fail(&self, operation: OperationName, mut props: TelemetryProps, reason: &str) {
        if let Some(marker) = &self.marker {
            props.insert("exceptionDetails".into(), reason.into());
            marker.fail_scenario(operation, props);
        }
    }
}

impl std::fmt::Debug for DirectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectClient")
            .field("runtime_id", &self.runtime_id)
            .finish_non_exhaustive()
    }
}

fn chat_props(token: &ChatToken) -> TelemetryProps {
    let mut props = TelemetryProps::new();
    props.insert("chatId".into(), token.chat_id.clone().into());
    props
}
