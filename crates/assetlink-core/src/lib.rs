//! Cross-context correlation protocol for assetlink.
//!
//! This crate implements the request/response correlation layer that lets a
//! client in one execution context invoke asset-service operations whose
//! execution happens in a second, isolated context:
//! - [`Envelope`]: the typed wire unit exchanged over the channel
//! - [`MessageChannel`] / [`MessageSink`]: the injected transport capability
//! - [`ContextHost`]: the platform capability that attaches the context
//! - [`IsolationCorrelator`]: host-side lifecycle + pending-request table
//! - [`SandboxDispatcher`]: sandbox-side request execution + telemetry relay
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 IsolationCorrelator (host)             │
//! │  - lifecycle: NotLoaded → Loading → Loaded / Failed    │
//! │  - pending table: correlation id → caller future      │
//! └────────────────────────────────────────────────────────┘
//!                  │ Request envelopes       ▲ Response envelopes
//!                  ▼                         │
//! ┌────────────────────────────────────────────────────────┐
//! │                    MessageChannel                      │
//! │  (asynchronous, unordered, origin-checked)             │
//! └────────────────────────────────────────────────────────┘
//!                  │                         ▲
//!                  ▼                         │
//! ┌────────────────────────────────────────────────────────┐
//! │              SandboxDispatcher (isolated)              │
//! │  - executes AssetApi calls, replies Success/Failure    │
//! │  - relays scenario telemetry back to the host          │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod correlator;
pub mod dispatcher;
pub mod envelope;
pub mod lifecycle;

pub use channel::{ChannelError, InboundMessage, MemoryChannel, MessageChannel, MessageSink, memory_pair};
pub use correlator::IsolationCorrelator;
pub use dispatcher::{RelayLogger, SandboxDispatcher};
pub use envelope::{Envelope, EnvelopeKind, EventStatus, RequestBody, ResponseBody};
pub use lifecycle::{ContextDescriptor, ContextError, ContextHost, ContextState};
