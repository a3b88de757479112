//! # OTLP - Log Exporter
//!
//! Defines a [LogExporter] to send [LogRecord]s to a collector's
//! `LogsService`.

use std::time::SystemTime;

use opentelemetry::logs::{AnyValue, Severity};
use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_sdk::Resource;

use crate::exporter::tonic::GrpcExporter;

/// Compression algorithm to use, defaults to none.
pub const OTEL_EXPORTER_OTLP_LOGS_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_LOGS_COMPRESSION";

/// Target to which the exporter is going to send logs
pub const OTEL_EXPORTER_OTLP_LOGS_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT";

/// Maximum time the exporter will wait for each batch logs export, in milliseconds.
pub const OTEL_EXPORTER_OTLP_LOGS_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_LOGS_TIMEOUT";

/// Key-value pairs to be used as metadata associated with gRPC requests
/// for sending logs.
/// Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_LOGS_HEADERS: &str = "OTEL_EXPORTER_OTLP_LOGS_HEADERS";

/// Exporter that sends [LogRecord]s to `LogsService/Export`.
pub type LogExporter = GrpcExporter<LogRecord>;

/// A single log record.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// The entity that produced the record.
    pub resource: Resource,
    /// The instrumentation scope that produced the record.
    pub scope: InstrumentationScope,
    /// When the event occurred, if known.
    pub timestamp: Option<SystemTime>,
    /// When the record was observed by the collection pipeline.
    pub observed_timestamp: SystemTime,
    /// Normalized severity.
    pub severity: Option<Severity>,
    /// Severity as reported by the source.
    pub severity_text: Option<String>,
    /// Event name, for records that represent named events.
    pub event_name: Option<String>,
    /// Record body.
    pub body: Option<AnyValue>,
    /// Record attributes.
    pub attributes: Vec<KeyValue>,
    /// Trace context the record was emitted in.
    pub trace_context: Option<(TraceId, SpanId)>,
}

impl LogRecord {
    /// An `INFO` record with a string body, observed at `time`.
    pub fn new(
        resource: Resource,
        scope: InstrumentationScope,
        body: impl Into<String>,
        time: SystemTime,
    ) -> Self {
        LogRecord {
            resource,
            scope,
            timestamp: Some(time),
            observed_timestamp: time,
            severity: Some(Severity::Info),
            severity_text: None,
            event_name: None,
            body: Some(AnyValue::from(body.into())),
            attributes: Vec::new(),
            trace_context: None,
        }
    }
}
