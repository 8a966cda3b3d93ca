//! Client construction: direct vs. isolated mode.

use std::sync::Arc;

use tracing::debug;

use assetlink_common::telemetry::{EventLogger, TracingLogger};
use assetlink_common::types::{
    AuthResponse, ChatToken, FileInfo, FileMetadata, ObjectRef, ViewContent, ViewStatus,
};
use assetlink_common::{ClientConfig, ClientError};
use assetlink_core::channel::MessageChannel;
use assetlink_core::lifecycle::ContextHost;
use assetlink_core::IsolationCorrelator;
use assetlink_rest::RestClient;

use crate::direct::DirectClient;

/// Platform capabilities required to run in isolated mode.
///
/// Supplied by the embedder: the transport the isolated context is
/// reachable over and the capability that attaches it. Its absence means
/// the platform cannot host isolation at all.
pub struct IsolationEnvironment {
    /// Origin of the embedding host context.
    pub host_origin: String,

    /// Transport the isolated context is reachable over.
    pub channel: Arc<dyn MessageChannel>,

    /// Platform capability that attaches/detaches the isolated context.
    pub host: Arc<dyn ContextHost>,
}

impl std::fmt::Debug for IsolationEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationEnvironment")
            .field("host_origin", &self.host_origin)
            .finish_non_exhaustive()
    }
}

/// An attachment client in either execution mode.
///
/// Both variants expose the same five operations; the isolated variant
/// additionally needs [`setup`](AssetClient::setup) /
/// [`dispose`](AssetClient::dispose), which are no-ops for the direct one.
#[derive(Debug)]
pub enum AssetClient {
    /// In-process execution.
    Direct(DirectClient),
    /// Execution inside an isolated context.
    Isolated(IsolationCorrelator),
}

impl AssetClient {
    /// Bring the client to a usable state.
    pub async fn setup(&self) -> Result<(), ClientError> {
        match self {
            AssetClient::Direct(_) => Ok(()),
            AssetClient::Isolated(correlator) => correlator.setup().await,
        }
    }

    /// Authenticate the chat token.
    pub async fn authenticate(&self, token: &ChatToken) -> Result<AuthResponse, ClientError> {
        match self {
            AssetClient::Direct(client) => client.authenticate(token).await,
            AssetClient::Isolated(correlator) => correlator.authenticate(token).await,
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
        match self {
            AssetClient::Direct(client) => {
                client.create_object(id, file, token, supported_mime_types).await
            }
            AssetClient::Isolated(correlator) => {
                correlator.create_object(id, file, token, supported_mime_types).await
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
        match self {
            AssetClient::Direct(client) => {
                client.upload_content(object_id, file, token, supported_mime_types).await
            }
            AssetClient::Isolated(correlator) => {
                correlator.upload_content(object_id, file, token, supported_mime_types).await
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
        match self {
            AssetClient::Direct(client) => {
                client.get_view_status(metadata, token, supported_mime_types).await
            }
            AssetClient::Isolated(correlator) => {
                correlator.get_view_status(metadata, token, supported_mime_types).await
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
        match self {
            AssetClient::Direct(client) => {
                client.get_view(metadata, location, token, supported_mime_types).await
            }
            AssetClient::Isolated(correlator) => {
                correlator.get_view(metadata, location, token, supported_mime_types).await
            }
        }
    }

    /// Tear the client down.
    ///
    /// For the isolated variant this detaches the context and rejects all
    /// in-flight requests; for the direct variant it is a no-op.
    pub fn dispose(&self) {
        if let AssetClient::Isolated(correlator) = self {
            correlator.dispose();
        }
    }

    /// Returns `true` if this client runs in isolated mode.
    pub fn is_isolated(&self) -> bool {
        matches!(self, AssetClient::Isolated(_))
    }
}

/// Create an attachment client from configuration.
///
/// Isolated mode requires an [`IsolationEnvironment`]; requesting it
/// without one fails with [`ClientError::PlatformUnsupported`] before any
/// call is attempted.
pub fn create_client(
    config: ClientConfig,
    logger: Option<Arc<dyn EventLogger>>,
    isolation: Option<IsolationEnvironment>,
) -> Result<AssetClient, ClientError> {
    debug!(isolated = config.isolated, "creating attachment client");

    if config.isolated {
        let Some(environment) = isolation else {
            return Err(ClientError::PlatformUnsupported);
        };
        let logger = logger.unwrap_or_else(|| Arc::new(TracingLogger));
        Ok(AssetClient::Isolated(IsolationCorrelator::new(
            config,
            environment.host_origin,
            environment.channel,
            environment.host,
            logger,
        )))
    } else {
        Ok(AssetClient::Direct(DirectClient::new(
            Arc::new(RestClient::new()),
            logger,
        )))
    }
}
