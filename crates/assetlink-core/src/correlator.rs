//! Host-side correlation of isolated-context calls.
//!
//! [`IsolationCorrelator`] owns the context lifecycle state machine and the
//! pending-request table. Each public operation assigns a fresh correlation
//! identifier, records the caller's future, posts a request envelope, and
//! settles the future when the matching response arrives, in any order
//! relative to other in-flight calls.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use assetlink_common::telemetry::EventLogger;
use assetlink_common::types::{
    AuthResponse, ChatToken, FileInfo, FileMetadata, ObjectRef, ViewContent, ViewStatus,
};
use assetlink_common::{ClientConfig, ClientError, OperationName};

use crate::channel::{InboundMessage, MessageChannel, MessageSink};
use crate::envelope::{Envelope, EnvelopeKind, EventStatus, RequestBody, ResponseBody};
use crate::lifecycle::{context_id_for, ContextDescriptor, ContextError, ContextHost, ContextState};

type PendingSender = oneshot::Sender<Result<ResponseBody, ClientError>>;

/// Host-side client for isolated-mode asset-service calls.
///
/// # Concurrency
///
/// All mutation happens on the embedding runtime's cooperative scheduler:
/// the pending table is touched only by the call-initiating methods and the
/// single inbound-listener task. The load gate guarantees at most one
/// context load is ever in flight, no matter how many calls race the first
/// one.
pub struct IsolationCorrelator {
    shared: Arc<Shared>,
    channel: Arc<dyn MessageChannel>,
    host: Arc<dyn ContextHost>,
    load_gate: tokio::sync::Mutex<()>,
    listener: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    client_id: String,
    runtime_id: String,
    context_id: String,
    config: ClientConfig,
    host_origin: String,
    sandbox_origin: Option<String>,
    state: parking_lot::Mutex<ContextState>,
    pending: DashMap<Uuid, PendingSender>,
    sink: watch::Sender<Option<Arc<dyn MessageSink>>>,
    logger: Arc<dyn EventLogger>,
}

impl IsolationCorrelator {
    /// Create a correlator.
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration (sandbox location, flags)
    /// * `host_origin` - Origin of the embedding host context
    /// * `channel` - Transport the isolated context is reachable over
    /// * `host` - Platform capability that attaches the isolated context
    /// * `logger` - Sink for telemetry relayed from the isolated context
    pub fn new(
        config: ClientConfig,
        host_origin: impl Into<String>,
        channel: Arc<dyn MessageChannel>,
        host: Arc<dyn ContextHost>,
        logger: Arc<dyn EventLogger>,
    ) -> Self {
        let client_id = Uuid::new_v4().to_string();
        let sandbox_origin = Url::parse(&config.sandbox_url)
            .ok()
            .map(|url| url.origin().ascii_serialization());
        let (sink, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            context_id: context_id_for(&config, &client_id),
            client_id,
            runtime_id: Uuid::new_v4().to_string(),
            config,
            host_origin: host_origin.into(),
            sandbox_origin,
            state: parking_lot::Mutex::new(ContextState::NotLoaded),
            pending: DashMap::new(),
            sink,
            logger,
        });

        Self {
            shared,
            channel,
            host,
            load_gate: tokio::sync::Mutex::new(()),
            listener: parking_lot::Mutex::new(None),
        }
    }

    /// Identifier scoping this correlator's isolated context.
    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    /// Runtime identifier of this client instance.
    pub fn runtime_id(&self) -> &str {
        &self.shared.runtime_id
    }

    /// Current lifecycle state of the isolated context.
    pub fn state(&self) -> ContextState {
        *self.shared.state.lock()
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Bring the isolated context up and install the inbound listener.
    ///
    /// Idempotent: the listener is installed exactly once and a context
    /// that is already loaded is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PlatformUnsupported`] when the platform
    /// cannot host the context, and [`ClientError::ContextLoadFailed`]
    /// when the load signal reports failure.
    pub async fn setup(&self) -> Result<(), ClientError> {
        self.install_listener()?;
        self.ensure_context().await
    }

    /// Authenticate the chat token inside the isolated context.
    pub async fn authenticate(&self, token: &ChatToken) -> Result<AuthResponse, ClientError> {
        let response = self
            .call(RequestBody::Authenticate {
                token: token.clone(),
            })
            .await?;
        match response {
            ResponseBody::Authenticated(auth) => Ok(auth),
            _ => Err(unexpected_payload(OperationName::Authenticate)),
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
        let response = self
            .call(RequestBody::CreateObject {
                id: id.to_string(),
                file: file.clone(),
                token: token.clone(),
                supported_mime_types: supported_mime_types.to_vec(),
            })
            .await?;
        match response {
            ResponseBody::ObjectCreated(object) => Ok(object),
            _ => Err(unexpected_payload(OperationName::CreateObject)),
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
        let response = self
            .call(RequestBody::UploadContent {
                object_id: object_id.to_string(),
                file: file.clone(),
                token: token.clone(),
                supported_mime_types: supported_mime_types.to_vec(),
            })
            .await?;
        match response {
            ResponseBody::ContentUploaded(metadata) => Ok(metadata),
            _ => Err(unexpected_payload(OperationName::UploadContent)),
        }
    }

    /// Poll the processing status of an uploaded attachment.
    pub async fn get_view_status(
        &self,
        metadata: &FileMetadata,
        token: &ChatToken,
        supported_mime_types: &[String],
    ) -> Result<ViewStatus, ClientError> {
        let response = self
            .call(RequestBody::GetViewStatus {
                metadata: metadata.clone(),
                token: token.clone(),
                supported_mime_types: supported_mime_types.to_vec(),
            })
            .await?;
        match response {
            ResponseBody::ViewStatus(status) => Ok(status),
            _ => Err(unexpected_payload(OperationName::GetViewStatus)),
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
        let response = self
            .call(RequestBody::GetView {
                metadata: metadata.clone(),
                location: location.to_string(),
                token: token.clone(),
                supported_mime_types: supported_mime_types.to_vec(),
            })
            .await?;
        match response {
            ResponseBody::View(content) => Ok(content),
            _ => Err(unexpected_payload(OperationName::GetView)),
        }
    }

    /// Tear the isolated context down.
    ///
    /// The listener is stopped, the context detached, and every pending
    /// request is rejected with [`ClientError::Disposed`]. Lifecycle
    /// returns to `NotLoaded`.
    pub fn dispose(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
        self.host.detach(&self.shared.context_id);

        let orphaned: Vec<Uuid> = self.shared.pending.iter().map(|entry| *entry.key()).collect();
        for correlation_id in orphaned {
            if let Some((_, tx)) = self.shared.pending.remove(&correlation_id) {
                let _ = tx.send(Err(ClientError::Disposed));
            }
        }

        *self.shared.state.lock() = ContextState::NotLoaded;
        let _ = self.shared.sink.send(None);
        info!(client_id = %self.shared.client_id, "correlator disposed");
    }

    /// Issue one correlated call and wait for its response.
    #[instrument(skip(self, body), fields(operation = %body.operation()))]
    async fn call(&self, body: RequestBody) -> Result<ResponseBody, ClientError> {
        let operation = body.operation();
        let sink = self.ensure_ready().await?;

        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(correlation_id, tx);

        let envelope = Envelope::request(
            self.shared.client_id.clone(),
            self.shared.runtime_id.clone(),
            correlation_id,
            body,
        );

        debug!(%correlation_id, "sending request");
        if sink.post(envelope).is_err() {
            self.shared.pending.remove(&correlation_id);
            return Err(ClientError::ChannelClosed);
        }

        let settled = match self.shared.config.response_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(settled) => settled,
                Err(_) => {
                    self.shared.pending.remove(&correlation_id);
                    warn!(%correlation_id, %operation, "request timed out");
                    return Err(ClientError::ResponseTimeout {
                        timeout_ms: self.shared.config.response_timeout_ms.unwrap_or_default(),
                    });
                }
            },
            None => rx.await,
        };

        // The sender is dropped without settling only when the table is
        // cleared outside dispose, which does not happen; treat it the
        // same as disposal.
        settled.map_err(|_| ClientError::Disposed)?
    }

    /// Install the listener, load the context, and wait for the sandbox
    /// announcement that discovers the reply target.
    async fn ensure_ready(&self) -> Result<Arc<dyn MessageSink>, ClientError> {
        self.install_listener()?;
        self.ensure_context().await?;

        let mut handle = self.shared.sink.subscribe();
        let discovered = handle
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
        discovered.clone().ok_or(ClientError::ChannelClosed)
    }

    fn install_listener(&self) -> Result<(), ClientError> {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return Ok(());
        }

        let rx = self
            .channel
            .subscribe()
            .map_err(|_| ClientError::ChannelClosed)?;
        let shared = self.shared.clone();
        *listener = Some(tokio::spawn(Shared::pump(shared, rx)));
        Ok(())
    }

    /// Drive the lifecycle to `Loaded`, loading at most once.
    ///
    /// Callers racing an in-flight load park on the gate and observe its
    /// outcome instead of starting a second load.
    async fn ensure_context(&self) -> Result<(), ClientError> {
        if self.state().is_loaded() {
            return Ok(());
        }

        let _gate = self.load_gate.lock().await;
        match self.state() {
            ContextState::Loaded => return Ok(()),
            ContextState::Failed => {
                return Err(ClientError::context_load_failed(
                    "isolated context previously failed to load",
                ));
            }
            ContextState::NotLoaded | ContextState::Loading => {}
        }

        if !self.host.is_supported() {
            return Err(ClientError::PlatformUnsupported);
        }

        let descriptor = ContextDescriptor::new(&self.shared.config, &self.shared.client_id)?;
        *self.shared.state.lock() = ContextState::Loading;
        debug!(context_id = %descriptor.context_id, url = %descriptor.resource_url, "loading isolated context");

        match self.host.attach(&descriptor).await {
            Ok(()) => {
                *self.shared.state.lock() = ContextState::Loaded;
                info!(context_id = %descriptor.context_id, "isolated context loaded");
                Ok(())
            }
            Err(ContextError::Unsupported) => {
                *self.shared.state.lock() = ContextState::Failed;
                Err(ClientError::PlatformUnsupported)
            }
            Err(err) => {
                *self.shared.state.lock() = ContextState::Failed;
                error!(error = %err, "isolated context failed to load");
                Err(ClientError::context_load_failed(err.to_string()))
            }
        }
    }
}

impl Shared {
    async fn pump(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<InboundMessage>) {
        while let Some(message) = rx.recv().await {
            shared.handle_inbound(message);
        }
        debug!("inbound channel drained, listener stopping");
    }

    fn handle_inbound(&self, message: InboundMessage) {
        if !self.is_trusted_origin(&message.origin) {
            debug!(origin = %message.origin, "ignoring message from untrusted origin");
            return;
        }

        if message.envelope.client_id != self.client_id {
            return;
        }

        if self.config.debug {
            debug!(envelope = ?message.envelope, "inbound message");
        }

        // The first contact reveals where to post; a reloaded context
        // replaces the previous target.
        if let Some(source) = message.source {
            self.sink.send_replace(Some(source));
        }

        let EnvelopeKind::Response {
            operation,
            correlation_id,
            status,
            body,
        } = message.envelope.kind
        else {
            debug!("ignoring request envelope on the host side");
            return;
        };

        if let Some(ResponseBody::Telemetry { level, event }) = &body {
            self.logger.log_event(*level, event);
            return;
        }

        if operation == OperationName::ContextLoaded {
            debug!(client_id = %self.client_id, "isolated context announced readiness");
            return;
        }

        let Some(correlation_id) = correlation_id else {
            debug!(%operation, "dropping response without correlation id");
            return;
        };

        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            // Late or duplicate delivery; not an error.
            debug!(%correlation_id, "dropping response with unknown correlation id");
            return;
        };

        let outcome = match status {
            EventStatus::Success => match body {
                Some(payload) => Ok(payload),
                None => Err(ClientError::operation_failed(
                    operation,
                    "success response without payload",
                )),
            },
            EventStatus::Failure => {
                let reason = match body {
                    Some(ResponseBody::Error { message }) => message,
                    _ => "operation failed in the isolated context".to_string(),
                };
                Err(ClientError::operation_failed(operation, reason))
            }
        };

        let _ = pending.send(outcome);
    }

    fn is_trusted_origin(&self, origin: &str) -> bool {
        origin == self.host_origin || self.sandbox_origin.as_deref() == Some(origin)
    }
}

impl std::fmt::Debug for IsolationCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationCorrelator")
            .field("client_id", &self.shared.client_id)
            .field("state", &self.state())
            .field("pending_requests", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

fn unexpected_payload(operation: OperationName) -> ClientError {
    ClientError::operation_failed(operation, "unexpected response payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_origin() {
        let (sink, _) = watch::channel(None);
        let shared = Shared {
            client_id: "c".into(),
            runtime_id: "r".into(),
            context_id: "ctx".into(),
            config: ClientConfig::default(),
            host_origin: "https://host.example.com".into(),
            sandbox_origin: Some("https://cdn.example.com".into()),
            state: parking_lot::Mutex::new(ContextState::NotLoaded),
            pending: DashMap::new(),
            sink,
            logger: Arc::new(assetlink_common::TracingLogger),
        };

        assert!(shared.is_trusted_origin("https://host.example.com"));
        assert!(shared.is_trusted_origin("https://cdn.example.com"));
        assert!(!shared.is_trusted_origin("https://evil.example.com"));
    }
}
