//! # OTLP - Span Exporter
//!
//! Defines a [SpanExporter] to send [SpanRecord]s to a collector's
//! `TraceService`.

use std::borrow::Cow;
use std::time::SystemTime;

use opentelemetry::trace::{SpanId, SpanKind, Status, TraceId};
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_sdk::Resource;

use crate::exporter::tonic::GrpcExporter;

/// Target to which the exporter is going to send spans, defaults to http://localhost:4317.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Max waiting time for the collector to process each spans batch, in milliseconds.
pub const OTEL_EXPORTER_OTLP_TRACES_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TRACES_TIMEOUT";
/// Compression algorithm to use, defaults to none.
pub const OTEL_EXPORTER_OTLP_TRACES_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_TRACES_COMPRESSION";
/// Key-value pairs to be used as metadata associated with gRPC requests
/// for sending spans.
/// Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_TRACES_HEADERS: &str = "OTEL_EXPORTER_OTLP_TRACES_HEADERS";

/// Exporter that sends [SpanRecord]s to `TraceService/Export`.
pub type SpanExporter = GrpcExporter<SpanRecord>;

/// A finished span.
#[derive(Clone, Debug)]
pub struct SpanRecord {
    /// The entity that produced the span.
    pub resource: Resource,
    /// The instrumentation scope that produced the span.
    pub scope: InstrumentationScope,
    /// Trace the span belongs to.
    pub trace_id: TraceId,
    /// Id of the span.
    pub span_id: SpanId,
    /// Parent span id, [`SpanId::INVALID`] for root spans.
    pub parent_span_id: SpanId,
    /// Span name.
    pub name: Cow<'static, str>,
    /// Span kind.
    pub kind: SpanKind,
    /// Span start time.
    pub start_time: SystemTime,
    /// Span end time.
    pub end_time: SystemTime,
    /// Span attributes.
    pub attributes: Vec<KeyValue>,
    /// Span events.
    pub events: Vec<SpanEvent>,
    /// Span status.
    pub status: Status,
}

/// A timestamped annotation on a span.
#[derive(Clone, Debug)]
pub struct SpanEvent {
    /// Event name.
    pub name: Cow<'static, str>,
    /// When the event happened.
    pub timestamp: SystemTime,
    /// Event attributes.
    pub attributes: Vec<KeyValue>,
}

impl SpanRecord {
    /// An internal span with no attributes, events or parent, starting and
    /// ending at `time`.
    pub fn new(
        resource: Resource,
        scope: InstrumentationScope,
        trace_id: TraceId,
        span_id: SpanId,
        name: impl Into<Cow<'static, str>>,
        time: SystemTime,
    ) -> Self {
        SpanRecord {
            resource,
            scope,
            trace_id,
            span_id,
            parent_span_id: SpanId::INVALID,
            name: name.into(),
            kind: SpanKind::Internal,
            start_time: time,
            end_time: time,
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
        }
    }
}
