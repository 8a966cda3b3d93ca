//! Scenario telemetry primitives.
//!
//! This module provides:
//! - [`StopWatch`]: elapsed-time measurement
//! - [`ScenarioMarker`]: start/complete/fail bracketing of named operations
//! - [`EventLogger`]: the pluggable sink telemetry events are written to
//!
//! Scenario events are both handed to the [`EventLogger`] and emitted via
//! the `tracing` crate for observability.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::operation::OperationName;

/// Severity of a telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum LogLevel {
    /// Debug-level events.
    Debug,
    /// Informational events.
    Info,
    /// Warning events.
    Warn,
    /// Error events.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Free-form structured properties attached to a telemetry event.
pub type TelemetryProps = serde_json::Map<String, serde_json::Value>;

/// A single structured telemetry event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryEvent {
    /// Derived event name, e.g. `CreateObjectCompleted`.
    pub event: String,

    /// Runtime identifier of the emitting client instance.
    pub runtime_id: String,

    /// Version of the client that emitted the event.
    pub client_version: String,

    /// Elapsed scenario time in milliseconds, present on complete/fail.
    #[serde(default)]
    pub elapsed_ms: Option<u64>,

    /// Caller-supplied properties.
    #[serde(default)]
    pub properties: TelemetryProps,
}

/// Sink for structured telemetry events.
pub trait EventLogger: Send + Sync {
    /// Record one telemetry event.
    fn log_event(&self, level: LogLevel, event: &TelemetryEvent);
}

/// [`EventLogger`] that forwards events to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl EventLogger for TracingLogger {
    fn log_event(&self, level: LogLevel, event: &TelemetryEvent) {
        let name = event.event.as_str();
        let runtime_id = event.runtime_id.as_str();
        match level {
            LogLevel::Debug => debug!(event = name, runtime_id, elapsed_ms = event.elapsed_ms, "telemetry"),
            LogLevel::Info => info!(event = name, runtime_id, elapsed_ms = event.elapsed_ms, "telemetry"),
            LogLevel::Warn => warn!(event = name, runtime_id, elapsed_ms = event.elapsed_ms, "telemetry"),
            LogLevel::Error => error!(event = name, runtime_id, elapsed_ms = event.elapsed_ms, "telemetry"),
        }
    }
}

/// Elapsed-time measurement primitive.
#[derive(Debug, Default)]
pub struct StopWatch {
    started: Option<Instant>,
}

impl StopWatch {
    /// Create a stopped stopwatch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start instant.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Elapsed milliseconds since `start()`.
    ///
    /// Only meaningful after `start()`; returns 0 otherwise.
    pub fn stop(&self) -> u64 {
        self.started
            .map(|started| u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Brackets named operations with start/complete/fail telemetry events.
///
/// At most one scenario per operation name is open at a time: re-entrant
/// starts reuse the existing timer, and concurrent same-named operations
/// share it.
pub struct ScenarioMarker {
    runtime_id: String,
    scenarios: Mutex<HashMap<OperationName, StopWatch>>,
    logger: Arc<dyn EventLogger>,
}

impl ScenarioMarker {
    /// Create a marker writing to the given logger.
    pub fn new(logger: Arc<dyn EventLogger>) -> Self {
        Self {
            runtime_id: String::new(),
            scenarios: Mutex::new(HashMap::new()),
            logger,
        }
    }

    /// Stamp events with the given runtime identifier.
    pub fn with_runtime_id(mut self, runtime_id: impl Into<String>) -> Self {
        self.runtime_id = runtime_id.into();
        self
    }

    /// Open a scenario for `operation` and emit its start event.
    ///
    /// If a scenario for the same operation is already open, the existing
    /// timer is kept and only the start event is emitted.
    pub fn start_scenario(&self, operation: OperationName, properties: TelemetryProps) {
        {
            let mut scenarios = self.scenarios.lock();
            scenarios.entry(operation).or_insert_with(|| {
                let mut watch = StopWatch::new();
                watch.start();
                watch
            });
        }

        self.emit(LogLevel::Info, started_event(operation), None, properties);
    }

    /// Close the scenario for `operation` and emit its completion event.
    ///
    /// If no scenario is open for `operation`, logs a local warning and
    /// emits nothing.
    pub fn complete_scenario(&self, operation: OperationName, properties: TelemetryProps) {
        let Some(watch) = self.scenarios.lock().remove(&operation) else {
            warn!(%operation, "scenario has not started");
            return;
        };

        self.emit(
            LogLevel::Info,
            completed_event(operation),
            Some(watch.stop()),
            properties,
        );
    }

    /// Close the scenario for `operation` and emit its failure event.
    ///
    /// If no scenario is open for `operation`, logs a local warning and
    /// emits nothing.
    pub fn fail_scenario(&self, operation: OperationName, properties: TelemetryProps) {
        let Some(watch) = self.scenarios.lock().remove(&operation) else {
            warn!(%operation, "scenario has not started");
            return;
        };

        self.emit(
            LogLevel::Error,
            failed_event(operation),
            Some(watch.stop()),
            properties,
        );
    }

    /// Number of currently open scenarios.
    pub fn open_scenarios(&self) -> usize {
        self.scenarios.lock().len()
    }

    fn emit(&self, level: LogLevel, event: String, elapsed_ms: Option<u64>, properties: TelemetryProps) {
        let event = TelemetryEvent {
            event,
            runtime_id: self.runtime_id.clone(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            elapsed_ms,
            properties,
        };
        self.logger.log_event(level, &event);
    }
}

impl std::fmt::Debug for ScenarioMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioMarker")
            .field("runtime_id", &self.runtime_id)
            .field("open_scenarios", &self.open_scenarios())
            .finish_non_exhaustive()
    }
}

fn started_event(operation: OperationName) -> String {
    format!("{operation}Started")
}

fn completed_event(operation: OperationName) -> String {
    format!("{operation}Completed")
}

fn failed_event(operation: OperationName) -> String {
    format!("{operation}Failed")
}
