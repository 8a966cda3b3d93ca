//! Chat attachment client for asset services.
//!
//! `assetlink` uploads and retrieves chat attachments through an asset
//! service, either in-process ([`DirectClient`]) or with every network
//! call isolated inside a sandboxed execution context reachable only over
//! an asynchronous message channel ([`IsolationCorrelator`]), so that
//! credentials and request details never touch the host context.
//!
//! # Quick start
//!
//! ```no_run
//! use assetlink::{create_client, ClientConfig};
//!
//! # async fn run() -> Result<(), assetlink::ClientError> {
//! let client = create_client(ClientConfig::default(), None, None)?;
//! client.setup().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Isolated mode additionally needs the platform capabilities bundled in
//! [`IsolationEnvironment`]: the message channel the sandbox is reachable
//! over and the [`ContextHost`] that attaches it.

pub mod direct;
pub mod factory;

pub use direct::DirectClient;
pub use factory::{create_client, AssetClient, IsolationEnvironment};

pub use assetlink_common::{
    AssetApi, AuthResponse, ChatToken, ClientConfig, ClientError, ContentState, EventLogger,
    FileInfo, FileMetadata, LogLevel, ObjectRef, OperationName, ScenarioMarker, ServiceError,
    StopWatch, TelemetryEvent, TelemetryProps, TracingLogger, ViewContent, ViewStatus,
};
pub use assetlink_core::{
    memory_pair, ChannelError, ContextDescriptor, ContextError, ContextHost, ContextState,
    Envelope, EnvelopeKind, EventStatus, InboundMessage, IsolationCorrelator, MemoryChannel,
    MessageChannel, MessageSink, RequestBody, ResponseBody, SandboxDispatcher,
};
pub use assetlink_rest::RestClient;
