//! End-to-end tests across the whole stack.
//!
//! A real correlator talks to a real sandbox runtime over the in-memory
//! channel pair; only the asset service itself is stubbed. The sandbox is
//! attached by a context host the way a platform embedding would do it:
//! spawned from the descriptor URL, bootstrapping its own configuration
//! from the query string.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{sleep, Duration};

use assetlink::{
    create_client, AssetApi, AuthResponse, ChatToken, ClientConfig, ContentState,
    ContextDescriptor, ContextError, ContextHost, EventLogger, FileInfo, FileMetadata,
    IsolationEnvironment, LogLevel, MemoryChannel, ObjectRef, ServiceError, TelemetryEvent,
    ViewContent, ViewStatus, memory_pair,
};
use assetlink_sandbox::{run_sandbox, SandboxConfig};

const HOST_ORIGIN: &str = "https://host.example.com";
const SANDBOX_ORIGIN: &str = "https://cdn.example.com";

// ============================================================================
// Test harness
// ============================================================================

/// Asset-service stub with a consistent upload/download story.
struct StubApi;

#[async_trait]
impl AssetApi for StubApi {
    async fn authenticate(&self, _token: &ChatToken) -> Result<AuthResponse, ServiceError> {
        Ok(AuthResponse { status: 200 })
    }

    async fn create_object(
        &self,
        _id: &str,
        _file: &FileInfo,
        _token: &ChatToken,
        _supported_mime_types: &[String],
    ) -> Result<ObjectRef, ServiceError> {
        Ok(ObjectRef { id: "obj-1".into() })
    }

    async fn upload_content(
        &self,
        object_id: &str,
        file: &FileInfo,
        _token: &ChatToken,
        _supported_mime_types: &[String],
    ) -> Result<FileMetadata, ServiceError> {
        Ok(FileMetadata {
            id: object_id.into(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size,
            url: format!("https://assets.example.com/v1/objects/{object_id}/content/image"),
            sharing_protocol: 0,
        })
    }

    async fn get_view_status(
        &self,
        metadata: &FileMetadata,
        _token: &ChatToken,
        _supported_mime_types: &[String],
    ) -> Result<ViewStatus, ServiceError> {
        Ok(ViewStatus {
            content_state: ContentState::Ready,
            view_state: Some(ContentState::Ready),
            view_location: format!("https://v.example.com/view/{}", metadata.id),
            status_location: None,
            content_length: Some(metadata.size),
            view_length: Some(metadata.size),
        })
    }

    async fn get_view(
        &self,
        _metadata: &FileMetadata,
        _location: &str,
        _token: &ChatToken,
        _supported_mime_types: &[String],
    ) -> Result<ViewContent, ServiceError> {
        Ok(ViewContent {
            content_type: "image/png".into(),
            bytes: vec![9, 9],
        })
    }
}

/// Context host that boots the sandbox runtime from the descriptor URL,
/// the way a platform embedding loads the sandbox resource.
struct SandboxHost {
    sandbox_channel: Mutex<Option<MemoryChannel>>,
    attached: Mutex<Option<ContextDescriptor>>,
}

impl SandboxHost {
    fn new(sandbox_channel: MemoryChannel) -> Self {
        Self {
            sandbox_channel: Mutex::new(Some(sandbox_channel)),
            attached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ContextHost for SandboxHost {
    fn is_supported(&self) -> bool {
        true
    }

    async fn attach(&self, descriptor: &ContextDescriptor) -> Result<(), ContextError> {
        let channel = self
            .sandbox_channel
            .lock()
            .take()
            .ok_or_else(|| ContextError::load_failed("sandbox already attached"))?;
        *self.attached.lock() = Some(descriptor.clone());

        let config = SandboxConfig::from_url(&descriptor.resource_url);
        let channel = Arc::new(channel);
        let parent = channel.peer_sink();
        tokio::spawn(run_sandbox(channel, parent, Arc::new(StubApi), config));
        Ok(())
    }

    fn detach(&self, _context_id: &str) {}
}

#[derive(Default)]
struct RecordingLogger {
    events: Mutex<Vec<(LogLevel, TelemetryEvent)>>,
}

impl EventLogger for RecordingLogger {
    fn log_event(&self, level: LogLevel, event: &TelemetryEvent) {
        self.events.lock().push((level, event.clone()));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,assetlink=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn config() -> ClientConfig {
    ClientConfig {
        isolated: true,
        sandbox_url: format!("{SANDBOX_ORIGIN}/assetlink/"),
        ..Default::default()
    }
}

fn token() -> ChatToken {
    ChatToken {
        chat_id: "chat-1".into(),
        token: "secret".into(),
        service_endpoint: Some("https://assets.example.com".into()),
        ..Default::default()
    }
}

fn file() -> FileInfo {
    FileInfo {
        name: "cat.png".into(),
        mime_type: "image/png".into(),
        size: 2,
        bytes: vec![9, 9],
    }
}

// ============================================================================
// Test: Full Attachment Round Trip
// ============================================================================

#[tokio::test]
async fn test_isolated_upload_and_download_round_trip() {
    init_tracing();

    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let logger = Arc::new(RecordingLogger::default());
    let client = create_client(
        config(),
        Some(logger.clone()),
        Some(IsolationEnvironment {
            host_origin: HOST_ORIGIN.into(),
            channel: Arc::new(host_chan),
            host: Arc::new(SandboxHost::new(sandbox_chan)),
        }),
    )
    .unwrap();
    assert!(client.is_isolated());

    client.setup().await.unwrap();

    let auth = client.authenticate(&token()).await.unwrap();
    assert_eq!(auth.status, 200);

    let object = client
        .create_object("chat-1", &file(), &token(), &[])
        .await
        .unwrap();
    assert_eq!(object.id, "obj-1");

    let metadata = client
        .upload_content(&object.id, &file(), &token(), &[])
        .await
        .unwrap();
    assert_eq!(metadata.id, "obj-1");
    assert_eq!(metadata.name, "cat.png");

    let status = client
        .get_view_status(&metadata, &token(), &[])
        .await
        .unwrap();
    assert_eq!(status.content_state, ContentState::Ready);
    assert_eq!(status.view_location, "https://v.example.com/view/obj-1");

    let view = client
        .get_view(&metadata, &status.view_location, &token(), &[])
        .await
        .unwrap();
    assert_eq!(view.bytes, vec![9, 9]);
    assert_eq!(view.content_type, "image/png");

    client.dispose();
}

// ============================================================================
// Test: Telemetry Relay Across the Channel
// ============================================================================

#[tokio::test]
async fn test_sandbox_scenarios_reach_host_logger() {
    init_tracing();

    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let logger = Arc::new(RecordingLogger::default());
    let client = create_client(
        config(),
        Some(logger.clone()),
        Some(IsolationEnvironment {
            host_origin: HOST_ORIGIN.into(),
            channel: Arc::new(host_chan),
            host: Arc::new(SandboxHost::new(sandbox_chan)),
        }),
    )
    .unwrap();

    client.authenticate(&token()).await.unwrap();

    // The relay is asynchronous relative to the call response.
    for _ in 0..50 {
        if logger.events.lock().len() >= 2 {
            break;
        }
        sleep(Duration::from_millis(2)).await;
    }

    let events = logger.events.lock();
    let names: Vec<&str> = events.iter().map(|(_, e)| e.event.as_str()).collect();
    assert!(names.contains(&"AuthenticateStarted"), "events: {names:?}");
    assert!(names.contains(&"AuthenticateCompleted"), "events: {names:?}");
}

// ============================================================================
// Test: Multi-Client Context Naming
// ============================================================================

#[tokio::test]
async fn test_multi_client_derives_context_id_from_client_id() {
    init_tracing();

    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let host = Arc::new(SandboxHost::new(sandbox_chan));
    let client = create_client(
        ClientConfig {
            multi_client: true,
            ..config()
        },
        None,
        Some(IsolationEnvironment {
            host_origin: HOST_ORIGIN.into(),
            channel: Arc::new(host_chan),
            host: host.clone(),
        }),
    )
    .unwrap();

    client.setup().await.unwrap();

    let descriptor = host.attached.lock().clone().expect("context attached");
    let assetlink::AssetClient::Isolated(correlator) = &client else {
        panic!("expected isolated client");
    };
    assert_eq!(descriptor.context_id, correlator.client_id());

    // The sandbox bootstrapped itself with the same client id.
    let bootstrapped = SandboxConfig::from_url(&descriptor.resource_url);
    assert_eq!(bootstrapped.client_id, correlator.client_id());
}
