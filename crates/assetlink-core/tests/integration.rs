//! Integration tests for the correlation protocol.
//!
//! These tests drive the full host-side path over the in-memory channel
//! pair:
//! - lifecycle: single-flight load, load failure, platform guard
//! - correlation: out-of-order responses, unknown-id drops, dispose
//! - telemetry: relay from the sandbox to the host logger

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use assetlink_common::telemetry::{EventLogger, LogLevel, TelemetryEvent};
use assetlink_common::types::{ChatToken, FileInfo, ObjectRef};
use assetlink_common::{ClientConfig, ClientError, OperationName, TracingLogger};
use assetlink_core::channel::{memory_pair, InboundMessage, MemoryChannel, MessageChannel};
use assetlink_core::envelope::{Envelope, EnvelopeKind, EventStatus, RequestBody, ResponseBody};
use assetlink_core::lifecycle::{ContextDescriptor, ContextError, ContextHost, ContextState};
use assetlink_core::IsolationCorrelator;

const HOST_ORIGIN: &str = "https://host.example.com";
const SANDBOX_ORIGIN: &str = "https://cdn.example.com";

// ============================================================================
// Test harness
// ============================================================================

/// Context host stub that counts attach calls and can be told to fail.
struct StubHost {
    attach_count: AtomicUsize,
    fail_load: bool,
    unsupported: bool,
    attach_delay: Option<Duration>,
}

impl StubHost {
    fn ok() -> Self {
        Self {
            attach_count: AtomicUsize::new(0),
            fail_load: false,
            unsupported: false,
            attach_delay: None,
        }
    }

    fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::ok()
        }
    }

    fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::ok()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            attach_delay: Some(delay),
            ..Self::ok()
        }
    }
}

#[async_trait]
impl ContextHost for StubHost {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn attach(&self, _descriptor: &ContextDescriptor) -> Result<(), ContextError> {
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.attach_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_load {
            return Err(ContextError::load_failed("embedding rejected"));
        }
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
        ..Default::default()
    }
}

fn file() -> FileInfo {
    FileInfo {
        name: "cat.png".into(),
        mime_type: "image/png".into(),
        size: 3,
        bytes: vec![1, 2, 3],
    }
}

fn announce(sandbox: &MemoryChannel, client_id: &str) {
    sandbox
        .peer_sink()
        .post(Envelope::response(
            client_id,
            OperationName::ContextLoaded,
            None,
            EventStatus::Success,
            Some(ResponseBody::ContextLoaded),
        ))
        .unwrap();
}

fn reply_created(sandbox: &MemoryChannel, client_id: &str, correlation_id: Uuid, object_id: &str) {
    sandbox
        .peer_sink()
        .post(Envelope::response(
            client_id,
            OperationName::CreateObject,
            Some(correlation_id),
            EventStatus::Success,
            Some(ResponseBody::ObjectCreated(ObjectRef {
                id: object_id.into(),
            })),
        ))
        .unwrap();
}

/// Receive request envelopes from the sandbox inbox, skipping nothing.
async fn next_request(rx: &mut mpsc::UnboundedReceiver<InboundMessage>) -> (Uuid, RequestBody) {
    loop {
        let message = rx.recv().await.expect("sandbox inbox closed");
        if let EnvelopeKind::Request {
            correlation_id,
            body,
        } = message.envelope.kind
        {
            return (correlation_id, body);
        }
    }
}

// ============================================================================
// Test: Correlation Integrity
// ============================================================================

#[tokio::test]
async fn test_swapped_responses_settle_their_own_callers() {
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let correlator = Arc::new(IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::ok()),
        Arc::new(TracingLogger),
    ));
    let client_id = correlator.client_id().to_string();

    let mut sandbox_rx = sandbox_chan.subscribe().unwrap();
    announce(&sandbox_chan, &client_id);

    let a = {
        let correlator = correlator.clone();
        tokio::spawn(async move {
            correlator
                .create_object("caller-a", &file(), &token(), &[])
                .await
        })
    };
    let b = {
        let correlator = correlator.clone();
        tokio::spawn(async move {
            correlator
                .create_object("caller-b", &file(), &token(), &[])
                .await
        })
    };

    let (cid_1, body_1) = next_request(&mut sandbox_rx).await;
    let (cid_2, body_2) = next_request(&mut sandbox_rx).await;

    let id_of = |body: &RequestBody| match body {
        RequestBody::CreateObject { id, .. } => id.clone(),
        other => panic!("unexpected request: {other:?}"),
    };

    // Deliver the responses in the opposite order they were requested.
    reply_created(&sandbox_chan, &client_id, cid_2, &format!("obj-{}", id_of(&body_2)));
    reply_created(&sandbox_chan, &client_id, cid_1, &format!("obj-{}", id_of(&body_1)));

    let result_a = a.await.unwrap().unwrap();
    let result_b = b.await.unwrap().unwrap();

    assert_eq!(result_a.id, "obj-caller-a");
    assert_eq!(result_b.id, "obj-caller-b");
    assert_eq!(correlator.pending_requests(), 0);
}

// ============================================================================
// Test: Single-Flight Load
// ============================================================================

#[tokio::test]
async fn test_concurrent_first_calls_load_context_once() {
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let host = Arc::new(StubHost::slow(Duration::from_millis(20)));
    let correlator = Arc::new(IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        host.clone(),
        Arc::new(TracingLogger),
    ));
    let client_id = correlator.client_id().to_string();

    let mut sandbox_rx = sandbox_chan.subscribe().unwrap();
    announce(&sandbox_chan, &client_id);

    // Echo every request back as a success so all callers settle.
    let responder = {
        let sandbox_sink = sandbox_chan.peer_sink();
        let client_id = client_id.clone();
        tokio::spawn(async move {
            loop {
                let (correlation_id, body) = next_request(&mut sandbox_rx).await;
                let RequestBody::CreateObject { id, .. } = body else {
                    continue;
                };
                sandbox_sink
                    .post(Envelope::response(
                        client_id.clone(),
                        OperationName::CreateObject,
                        Some(correlation_id),
                        EventStatus::Success,
                        Some(ResponseBody::ObjectCreated(ObjectRef { id })),
                    ))
                    .unwrap();
            }
        })
    };

    let mut calls = Vec::new();
    for i in 0..5 {
        let correlator = correlator.clone();
        calls.push(tokio::spawn(async move {
            correlator
                .create_object(&format!("caller-{i}"), &file(), &token(), &[])
                .await
        }));
    }

    for call in calls {
        assert!(call.await.unwrap().is_ok());
    }

    assert_eq!(host.attach_count.load(Ordering::SeqCst), 1);
    assert_eq!(correlator.state(), ContextState::Loaded);
    responder.abort();
}

// ============================================================================
// Test: Unknown-Correlation Drop
// ============================================================================

#[tokio::test]
async fn test_unknown_correlation_id_is_dropped_silently() {
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let correlator = Arc::new(IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::ok()),
        Arc::new(TracingLogger),
    ));
    let client_id = correlator.client_id().to_string();

    let mut sandbox_rx = sandbox_chan.subscribe().unwrap();
    announce(&sandbox_chan, &client_id);

    let call = {
        let correlator = correlator.clone();
        tokio::spawn(async move {
            correlator
                .create_object("caller-a", &file(), &token(), &[])
                .await
        })
    };
    let (correlation_id, _) = next_request(&mut sandbox_rx).await;

    // A stray response with a correlation id nobody is waiting for must
    // not disturb the in-flight call.
    reply_created(&sandbox_chan, &client_id, Uuid::new_v4(), "stray");
    reply_created(&sandbox_chan, &client_id, correlation_id, "obj-1");

    let result = call.await.unwrap().unwrap();
    assert_eq!(result.id, "obj-1");
    assert_eq!(correlator.pending_requests(), 0);
}

// ============================================================================
// Test: Lifecycle Failures
// ============================================================================

#[tokio::test]
async fn test_load_failure_parks_in_failed_state() {
    let (host_chan, _sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let correlator = IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::failing()),
        Arc::new(TracingLogger),
    );

    let err = correlator.setup().await.unwrap_err();
    assert!(matches!(err, ClientError::ContextLoadFailed { .. }));
    assert_eq!(correlator.state(), ContextState::Failed);

    // No retry: later calls fail fast without another load attempt.
    let err = correlator.authenticate(&token()).await.unwrap_err();
    assert!(matches!(err, ClientError::ContextLoadFailed { .. }));
}

#[tokio::test]
async fn test_unsupported_platform_rejects_setup() {
    let (host_chan, _sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let correlator = IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::unsupported()),
        Arc::new(TracingLogger),
    );

    let err = correlator.setup().await.unwrap_err();
    assert!(err.is_platform_unsupported());
    assert_eq!(correlator.state(), ContextState::NotLoaded);
}

// ============================================================================
// Test: Dispose
// ============================================================================

#[tokio::test]
async fn test_dispose_rejects_pending_requests() {
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let correlator = Arc::new(IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::ok()),
        Arc::new(TracingLogger),
    ));
    let client_id = correlator.client_id().to_string();

    let mut sandbox_rx = sandbox_chan.subscribe().unwrap();
    announce(&sandbox_chan, &client_id);

    let call = {
        let correlator = correlator.clone();
        tokio::spawn(async move { correlator.authenticate(&token()).await })
    };

    // Wait until the request is in flight, then dispose without answering.
    let _ = next_request(&mut sandbox_rx).await;
    assert_eq!(correlator.pending_requests(), 1);

    correlator.dispose();

    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_disposed());
    assert_eq!(correlator.pending_requests(), 0);
    assert_eq!(correlator.state(), ContextState::NotLoaded);
}

// ============================================================================
// Test: Response Timeout (opt-in)
// ============================================================================

#[tokio::test]
async fn test_configured_timeout_bounds_response_wait() {
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let correlator = Arc::new(IsolationCorrelator::new(
        ClientConfig {
            response_timeout_ms: Some(50),
            ..config()
        },
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::ok()),
        Arc::new(TracingLogger),
    ));
    let client_id = correlator.client_id().to_string();

    let mut sandbox_rx = sandbox_chan.subscribe().unwrap();
    announce(&sandbox_chan, &client_id);

    let call = {
        let correlator = correlator.clone();
        tokio::spawn(async move { correlator.authenticate(&token()).await })
    };
    let _ = next_request(&mut sandbox_rx).await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::ResponseTimeout { timeout_ms: 50 }));
    assert_eq!(correlator.pending_requests(), 0);
}

// ============================================================================
// Test: Origin Validation
// ============================================================================

#[tokio::test]
async fn test_untrusted_origin_is_ignored() {
    // The sandbox endpoint reports an origin the config does not trust, so
    // its announcement never discovers the reply target and the call
    // cannot proceed.
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, "https://evil.example.com");
    let correlator = Arc::new(IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::ok()),
        Arc::new(TracingLogger),
    ));
    let client_id = correlator.client_id().to_string();
    announce(&sandbox_chan, &client_id);

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        correlator.authenticate(&token()),
    )
    .await;
    assert!(result.is_err(), "call must not proceed on an untrusted origin");
    assert_eq!(correlator.pending_requests(), 0);
}

// ============================================================================
// Test: Telemetry Relay
// ============================================================================

#[tokio::test]
async fn test_relayed_telemetry_reaches_host_logger() {
    let (host_chan, sandbox_chan) = memory_pair(HOST_ORIGIN, SANDBOX_ORIGIN);
    let logger = Arc::new(RecordingLogger::default());
    let correlator = IsolationCorrelator::new(
        config(),
        HOST_ORIGIN,
        Arc::new(host_chan),
        Arc::new(StubHost::ok()),
        logger.clone(),
    );
    let client_id = correlator.client_id().to_string();

    announce(&sandbox_chan, &client_id);
    correlator.setup().await.unwrap();

    sandbox_chan
        .peer_sink()
        .post(Envelope::response(
            &client_id,
            OperationName::SendTelemetry,
            None,
            EventStatus::Success,
            Some(ResponseBody::Telemetry {
                level: LogLevel::Info,
                event: TelemetryEvent {
                    event: "CreateObjectCompleted".into(),
                    runtime_id: "runtime-1".into(),
                    client_version: "0.1.0".into(),
                    elapsed_ms: Some(12),
                    properties: serde_json::Map::new(),
                },
            }),
        ))
        .unwrap();

    // The relay is asynchronous; poll briefly for the logger to observe it.
    for _ in 0..50 {
        if !logger.events.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let events = logger.events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, LogLevel::Info);
    assert_eq!(events[0].1.event, "CreateObjectCompleted");
    assert_eq!(events[0].1.elapsed_ms, Some(12));
}
