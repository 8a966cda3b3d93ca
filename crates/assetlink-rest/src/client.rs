//! The five asset-service HTTP operations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use reqwest::Client;
use tracing::{debug, warn};

use assetlink_common::types::{
    AuthResponse, ChatToken, ContentState, FileInfo, FileMetadata, ObjectRef, ViewContent,
    ViewStatus,
};
use assetlink_common::{AssetApi, ServiceError};

use crate::object_type::{object_type_for, view_kind, ApiOperation};

/// Header carrying the client version to the service.
const CLIENT_VERSION_HEADER: &str = "X-Client-Version";

/// Header value identifying this client build.
const CLIENT_VERSION: &str = concat!("assetlink/", env!("CARGO_PKG_VERSION"));

/// Accept header sent when downloading image views.
const IMAGE_ACCEPT: &str = "image/webp,image/*,*/*;q=0.8";

/// Asset-service REST client.
///
/// Stateless apart from the pooled HTTP connection; safe to share across
/// tasks.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
}

impl RestClient {
    /// Create a client with pooled connections and conservative timeouts.
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(CLIENT_VERSION)
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// Create with a custom HTTP client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn authorized(&self, request: reqwest::RequestBuilder, token: &ChatToken) -> reqwest::RequestBuilder {
        request
            .header(header::AUTHORIZATION, format!("Bearer {}", token.token))
            .header(CLIENT_VERSION_HEADER, CLIENT_VERSION)
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl AssetApi for RestClient {
    async fn authenticate(&self, token: &ChatToken) -> Result<AuthResponse, ServiceError> {
        let endpoint = token.endpoint()?;
        let url = format!("{endpoint}/v1/tokenauth");
        debug!(%url, chat_id = %token.chat_id, "authenticating chat token");

        let response = self
            .authorized(self.http.post(&url), token)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Behavior-Override", "redirectAs404")
            .body(format!("token={}", token.token))
            .send()
            .await
            .map_err(|e| ServiceError::authentication_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::authentication_failed(format!(
                "status {status}"
            )));
        }

        Ok(AuthResponse {
            status: status.as_u16(),
        })
    }

    async fn create_object(
        &self,
        id: &str,
        file: &FileInfo,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ObjectRef, ServiceError> {
        let endpoint = token.endpoint()?;
        let url = format!("{endpoint}/v1/objects");
        let object_type = object_type_for(file, ApiOperation::Create, supported_mime_types);
        debug!(%url, object_type, filename = %file.name, "creating object");

        let body = serde_json::json!({
            "filename": file.name,
            "permissions": { id: ["read"] },
            "type": object_type,
        });

        let response = self
            .authorized(self.http.post(&url), token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::create_object_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::create_object_failed(format!(
                "status {status}"
            )));
        }

        response
            .json::<ObjectRef>()
            .await
            .map_err(|e| ServiceError::create_object_failed(format!("invalid response: {e}")))
    }

    async fn upload_content(
        &self,
        object_id: &str,
        file: &FileInfo,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<FileMetadata, ServiceError> {
        let endpoint = token.endpoint()?;
        let object_type = object_type_for(file, ApiOperation::Upload, supported_mime_types);
        let url = format!("{endpoint}/v1/objects/{object_id}/content/{object_type}");
        debug!(%url, size = file.size, "uploading content");

        let response = self
            .authorized(self.http.put(&url), token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| ServiceError::upload_content_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::upload_content_failed(format!(
                "status {status}"
            )));
        }

        Ok(FileMetadata {
            id: object_id.to_string(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size,
            url,
            sharing_protocol: 0,
        })
    }

    async fn get_view_status(
        &self,
        metadata: &FileMetadata,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewStatus, ServiceError> {
        let endpoint = token.endpoint()?;
        let view = view_kind(metadata, supported_mime_types);
        let url = format!("{endpoint}/v1/objects/{}/views/{view}/status", metadata.id);
        debug!(%url, "fetching view status");

        let response = self
            .authorized(self.http.get(&url), token)
            .send()
            .await
            .map_err(|e| ServiceError::view_status_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::view_status_failed(format!("status {status}")));
        }

        let view_status = response
            .json::<ViewStatus>()
            .await
            .map_err(|e| ServiceError::view_status_failed(format!("invalid response: {e}")))?;

        if view_status.view_location.is_empty() {
            return Err(ServiceError::ViewLocationMissing);
        }

        if let Some(view_state) = view_status.view_state {
            if view_state != ContentState::Ready {
                warn!(object_id = %metadata.id, ?view_state, "view is not ready");
            }
        }

        if view_status.content_state == ContentState::Expired {
            return Err(ServiceError::ContentExpired);
        }

        Ok(view_status)
    }

    async fn get_view(
        &self,
        metadata: &FileMetadata,
        location: &str,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewContent, ServiceError> {
        debug!(%location, object_id = %metadata.id, "downloading view");

        let mut request = self.authorized(self.http.get(location), token);
        if crate::object_type::is_supported_image(
            &metadata.name,
            &metadata.mime_type,
            supported_mime_types,
        ) {
            request = request
                .header(header::ACCEPT, IMAGE_ACCEPT)
                .header(header::ACCEPT_ENCODING, "gzip, deflate, br");
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::view_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::view_failed(format!("status {status}")));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(metadata.mime_type.as_str())
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::view_failed(e.to_string()))?;

        Ok(ViewContent {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
