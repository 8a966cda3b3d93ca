//! Sandbox-side request execution.
//!
//! [`SandboxDispatcher`] runs inside the isolated context. It announces
//! readiness to the host, executes incoming requests against the
//! [`AssetApi`] collaborator, and always answers with a response envelope:
//! failures are converted, never propagated as panics into the channel.
//! Scenario telemetry is relayed back to the host through the same
//! transport, gated by the telemetry flag.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use assetlink_common::telemetry::{
    EventLogger, LogLevel, ScenarioMarker, TelemetryEvent, TelemetryProps,
};
use assetlink_common::{AssetApi, OperationName, ServiceError};

use crate::channel::{ChannelError, InboundMessage, MessageSink};
use crate::envelope::{Envelope, EnvelopeKind, EventStatus, RequestBody, ResponseBody};

/// [`EventLogger`] that relays telemetry events to the host context.
///
/// Events are always emitted to the local `tracing` subscriber; they cross
/// the channel only while relaying is enabled.
pub struct RelayLogger {
    client_id: String,
    parent: Arc<dyn MessageSink>,
    enabled: bool,
}

impl RelayLogger {
    /// Create a relay for the given client, posting through `parent`.
    pub fn new(client_id: impl Into<String>, parent: Arc<dyn MessageSink>, enabled: bool) -> Self {
        Self {
            client_id: client_id.into(),
            parent,
            enabled,
        }
    }
}

impl EventLogger for RelayLogger {
    fn log_event(&self, level: LogLevel, event: &TelemetryEvent) {
        debug!(event = %event.event, %level, "sandbox telemetry");

        if !self.enabled {
            return;
        }

        let envelope = Envelope::response(
            self.client_id.clone(),
            OperationName::SendTelemetry,
            None,
            EventStatus::Success,
            Some(ResponseBody::Telemetry {
                level,
                event: event.clone(),
            }),
        );
        if self.parent.post(envelope).is_err() {
            debug!("telemetry relay channel closed");
        }
    }
}

/// Executes correlated requests inside the isolated context.
pub struct SandboxDispatcher {
    client_id: String,
    api: Arc<dyn AssetApi>,
    parent: Arc<dyn MessageSink>,
    marker: ScenarioMarker,
}

impl SandboxDispatcher {
    /// Create a dispatcher for one client/context pair.
    ///
    /// # Arguments
    ///
    /// * `client_id` - Identifier of the client this context serves
    /// * `api` - The asset-service collaborator
    /// * `parent` - Sink posting to the host context
    /// * `telemetry_enabled` - Whether scenario events cross the channel
    pub fn new(
        client_id: impl Into<String>,
        api: Arc<dyn AssetApi>,
        parent: Arc<dyn MessageSink>,
        telemetry_enabled: bool,
    ) -> Self {
        let client_id = client_id.into();
        let relay: Arc<dyn EventLogger> = Arc::new(RelayLogger::new(
            client_id.clone(),
            parent.clone(),
            telemetry_enabled,
        ));

        Self {
            client_id,
            api,
            parent,
            marker: ScenarioMarker::new(relay),
        }
    }

    /// Announce readiness to the host.
    ///
    /// The announcement carries no correlation id; its arrival is what
    /// lets the host capture this context as its reply target.
    pub fn announce(&self) -> Result<(), ChannelError> {
        info!(client_id = %self.client_id, "sandbox announcing readiness");
        self.parent.post(Envelope::response(
            self.client_id.clone(),
            OperationName::ContextLoaded,
            None,
            EventStatus::Success,
            Some(ResponseBody::ContextLoaded),
        ))
    }

    /// Serve requests until the inbound stream closes.
    pub async fn serve(&self, mut rx: mpsc::UnboundedReceiver<InboundMessage>) {
        while let Some(message) = rx.recv().await {
            self.handle(message.envelope).await;
        }
        debug!(client_id = %self.client_id, "inbound stream closed, dispatcher stopping");
    }

    /// Execute one envelope if it is a request addressed to this context.
    pub async fn handle(&self, envelope: Envelope) {
        if envelope.client_id != self.client_id {
            return;
        }

        let runtime_id = envelope.runtime_id;
        let EnvelopeKind::Request {
            correlation_id,
            body,
        } = envelope.kind
        else {
            return;
        };

        let operation = body.operation();
        let mut props = request_props(&body, runtime_id.as_deref());
        debug!(%operation, %correlation_id, "dispatching request");

        self.marker.start_scenario(operation, props.clone());

        let result = self.execute(body).await;
        match result {
            Ok(response) => {
                enrich_completion_props(&mut props, &response);
                self.marker.complete_scenario(operation, props);
                self.reply(
                    operation,
                    correlation_id,
                    EventStatus::Success,
                    Some(response),
                );
            }
            Err(err) => {
                props.insert("exceptionDetails".into(), err.to_string().into());
                self.marker.fail_scenario(operation, props);
                self.reply(
                    operation,
                    correlation_id,
                    EventStatus::Failure,
                    Some(ResponseBody::Error {
                        message: err.to_string(),
                    }),
                );
            }
        }
    }

    async fn execute(&self, body: RequestBody) -> Result<ResponseBody, ServiceError> {
        match body {
            RequestBody::Authenticate { token } => self
                .api
                .authenticate(&token)
                .await
                .map(ResponseBody::Authenticated),
            RequestBody::CreateObject {
                id,
                file,
                token,
                supported_mime_types,
            } => self
                .api
                .create_object(&id, &file, &token, &supported_mime_types)
                .await
                .map(ResponseBody::ObjectCreated),
            RequestBody::UploadContent {
                object_id,
                file,
                token,
                supported_mime_types,
            } => self
                .api
                .upload_content(&object_id, &file, &token, &supported_mime_types)
                .await
                .map(ResponseBody::ContentUploaded),
            RequestBody::GetViewStatus {
                metadata,
                token,
                supported_mime_types,
            } => self
                .api
                .get_view_status(&metadata, &token, &supported_mime_types)
                .await
                .map(ResponseBody::ViewStatus),
            RequestBody::GetView {
                metadata,
                location,
                token,
                supported_mime_types,
            } => self
                .api
                .get_view(&metadata, &location, &token, &supported_mime_types)
                .await
                .map(ResponseBody::View),
        }
    }

    fn reply(
        &self,
        operation: OperationName,
        correlation_id: Uuid,
        status: EventStatus,
        body: Option<ResponseBody>,
    ) {
        let envelope = Envelope::response(
            self.client_id.clone(),
            operation,
            Some(correlation_id),
            status,
            body,
        );
        if self.parent.post(envelope).is_err() {
            warn!(%operation, %correlation_id, "failed to post response to host");
        }
    }
}

impl std::fmt::Debug for SandboxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxDispatcher")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Telemetry properties derived from a request.
fn request_props(body: &RequestBody, runtime_id: Option<&str>) -> TelemetryProps {
    let mut props = TelemetryProps::new();
    if let Some(runtime_id) = runtime_id {
        props.insert("clientRuntimeId".into(), runtime_id.into());
    }

    match body {
        RequestBody::Authenticate { token } => {
            props.insert("chatId".into(), token.chat_id.clone().into());
        }
        RequestBody::CreateObject { file, token, .. } => {
            props.insert("chatId".into(), token.chat_id.clone().into());
            props.insert("mimeType".into(), file.mime_type.clone().into());
        }
        RequestBody::UploadContent {
            object_id,
            file,
            token,
            ..
        } => {
            props.insert("chatId".into(), token.chat_id.clone().into());
            props.insert("documentId".into(), object_id.clone().into());
            props.insert("mimeType".into(), file.mime_type.clone().into());
        }
        RequestBody::GetViewStatus {
            metadata, token, ..
        }
        | RequestBody::GetView {
            metadata, token, ..
        } => {
            props.insert("chatId".into(), token.chat_id.clone().into());
            props.insert("documentId".into(), metadata.id.clone().into());
            props.insert("mimeType".into(), metadata.mime_type.clone().into());
        }
    }

    props
}

fn enrich_completion_props(props: &mut TelemetryProps, response: &ResponseBody) {
    if let ResponseBody::ObjectCreated(object) = response {
        props.insert("documentId".into(), object.id.clone().into());
    }
}
