//! The injected message-channel capability.
//!
//! The correlator and the dispatcher never talk to a concrete transport;
//! they are handed a [`MessageChannel`] to receive from and discover
//! [`MessageSink`]s to post to. An in-process implementation backed by
//! tokio channels ([`memory_pair`]) serves tests and non-browser embedders.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::envelope::Envelope;

/// Message-channel errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The other side of the channel is gone.
    #[error("Channel closed")]
    Closed,

    /// The channel's inbound stream was already taken.
    #[error("Channel already subscribed")]
    AlreadySubscribed,
}

/// Write end of a channel: posts envelopes toward one execution context.
pub trait MessageSink: Send + Sync {
    /// Post one envelope.
    fn post(&self, envelope: Envelope) -> Result<(), ChannelError>;
}

/// An envelope as delivered by the channel.
///
/// `origin` identifies where the message came from and must be validated
/// before acting on the envelope. `source` is a sink posting back to the
/// sender; capturing it is how the correlator discovers its reply target.
#[derive(Clone)]
pub struct InboundMessage {
    /// Origin of the sending context.
    pub origin: String,

    /// Sink posting back to the sender, when the transport can provide one.
    pub source: Option<Arc<dyn MessageSink>>,

    /// The delivered envelope.
    pub envelope: Envelope,
}

impl std::fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMessage")
            .field("origin", &self.origin)
            .field("envelope", &self.envelope)
            .finish_non_exhaustive()
    }
}

/// Read end of a channel: yields inbound messages for one execution
/// context.
pub trait MessageChannel: Send + Sync {
    /// Take the inbound stream.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadySubscribed`] if the stream was taken
    /// before; a channel has exactly one consumer.
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<InboundMessage>, ChannelError>;
}

struct EndpointInner {
    origin: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

/// One endpoint of an in-process channel pair.
pub struct MemoryChannel {
    local: Arc<EndpointInner>,
    remote: Arc<EndpointInner>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
}

impl MemoryChannel {
    /// Sink posting to the peer endpoint.
    ///
    /// In a browser-like embedding this is the equivalent of a sandbox
    /// holding a reference to its parent context.
    pub fn peer_sink(&self) -> Arc<dyn MessageSink> {
        Arc::new(PeerSink {
            from: self.local.clone(),
            to: self.remote.clone(),
        })
    }

    /// Origin label of this endpoint.
    pub fn origin(&self) -> &str {
        &self.local.origin
    }
}

impl MessageChannel for MemoryChannel {
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<InboundMessage>, ChannelError> {
        self.inbox.lock().take().ok_or(ChannelError::AlreadySubscribed)
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("origin", &self.local.origin)
            .finish_non_exhaustive()
    }
}

struct PeerSink {
    from: Arc<EndpointInner>,
    to: Arc<EndpointInner>,
}

impl MessageSink for PeerSink {
    fn post(&self, envelope: Envelope) -> Result<(), ChannelError> {
        let reply = Arc::new(PeerSink {
            from: self.to.clone(),
            to: self.from.clone(),
        });
        self.to
            .tx
            .send(InboundMessage {
                origin: self.from.origin.clone(),
                source: Some(reply),
                envelope,
            })
            .map_err(|_| ChannelError::Closed)
    }
}

/// Create a connected pair of in-process channel endpoints.
///
/// Messages posted through one endpoint's [`MemoryChannel::peer_sink`]
/// arrive on the other endpoint labeled with the poster's origin and
/// carrying a `source` sink for replies, mirroring how a real message
/// transport exposes the sending context.
pub fn memory_pair(
    host_origin: impl Into<String>,
    sandbox_origin: impl Into<String>,
) -> (MemoryChannel, MemoryChannel) {
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let (sandbox_tx, sandbox_rx) = mpsc::unbounded_channel();

    let host = Arc::new(EndpointInner {
        origin: host_origin.into(),
        tx: host_tx,
    });
    let sandbox = Arc::new(EndpointInner {
        origin: sandbox_origin.into(),
        tx: sandbox_tx,
    });

    (
        MemoryChannel {
            local: host.clone(),
            remote: sandbox.clone(),
            inbox: Mutex::new(Some(host_rx)),
        },
        MemoryChannel {
            local: sandbox,
            remote: host,
            inbox: Mutex::new(Some(sandbox_rx)),
        },
    )
}
