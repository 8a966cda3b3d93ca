//! Common types, errors, configuration, and telemetry for assetlink.
//!
//! This crate holds everything shared between the host-side clients, the
//! sandbox-side dispatcher, and the REST collaborator:
//! - [`ClientConfig`]: constructor-threaded configuration
//! - [`ClientError`] and [`ServiceError`]: the two error taxonomies
//! - [`AssetApi`]: the asset-service collaborator trait
//! - [`ScenarioMarker`] and [`StopWatch`]: scenario telemetry primitives
//! - Domain types: [`ChatToken`], [`FileInfo`], [`FileMetadata`], ...

pub mod api;
pub mod config;
pub mod error;
pub mod filename;
pub mod operation;
pub mod telemetry;
pub mod types;

pub use api::AssetApi;
pub use config::ClientConfig;
pub use error::{ClientError, ServiceError};
pub use operation::OperationName;
pub use telemetry::{
    EventLogger, LogLevel, ScenarioMarker, StopWatch, TelemetryEvent, TelemetryProps,
    TracingLogger,
};
pub use types::{
    AuthResponse, ChatToken, ContentState, FileInfo, FileMetadata, ObjectRef, ViewContent,
    ViewStatus,
};
