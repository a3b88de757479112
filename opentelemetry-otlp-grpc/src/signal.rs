//! The per-signal configuration table.
//!
//! The exporter has a single implementation; what differs between traces,
//! metrics and logs is captured by one [`Signal`] row each.

use prost::Message;

/// The kind of telemetry a [`Signal`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Spans.
    Traces,
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
}

/// Items the collector reported as rejected in an otherwise successful export.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialSuccess {
    /// Number of spans, data points or log records that were rejected.
    pub rejected: i64,
    /// Human readable reason given by the collector, may be empty.
    pub error_message: String,
}

impl PartialSuccess {
    /// Whether the collector actually reported anything.
    pub fn is_reported(&self) -> bool {
        self.rejected > 0 || !self.error_message.is_empty()
    }
}

/// One row of the signal table.
#[derive(Debug)]
pub struct Signal {
    /// Which telemetry kind this row describes.
    pub kind: SignalKind,
    /// Singular noun used in diagnostics, e.g. `"trace"` in
    /// "Failed to export traces."
    pub type_name: &'static str,
    /// Fully qualified gRPC service name.
    pub service: &'static str,
    /// gRPC method name.
    pub method: &'static str,
    /// Full RPC path, `/{service}/{method}`.
    pub path: &'static str,
    pub(crate) endpoint_var: &'static str,
    pub(crate) timeout_var: &'static str,
    pub(crate) headers_var: &'static str,
    pub(crate) compression_var: &'static str,
    pub(crate) partial_success: fn(&[u8]) -> Option<PartialSuccess>,
}

impl Signal {
    /// Decode the partial success section of a response envelope.
    ///
    /// An empty or undecodable response yields `None`.
    pub fn partial_success(&self, response: &[u8]) -> Option<PartialSuccess> {
        (self.partial_success)(response)
    }
}

/// Traces: `opentelemetry.proto.collector.trace.v1.TraceService/Export`.
#[cfg(feature = "trace")]
pub const TRACES: Signal = Signal {
    kind: SignalKind::Traces,
    type_name: "trace",
    service: "opentelemetry.proto.collector.trace.v1.TraceService",
    method: "Export",
    path: "/opentelemetry.proto.collector.trace.v1.TraceService/Export",
    endpoint_var: crate::span::OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
    timeout_var: crate::span::OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
    headers_var: crate::span::OTEL_EXPORTER_OTLP_TRACES_HEADERS,
    compression_var: crate::span::OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
    partial_success: trace_partial_success,
};

/// Metrics: `opentelemetry.proto.collector.metrics.v1.MetricsService/Export`.
#[cfg(feature = "metrics")]
pub const METRICS: Signal = Signal {
    kind: SignalKind::Metrics,
    type_name: "metric",
    service: "opentelemetry.proto.collector.metrics.v1.MetricsService",
    method: "Export",
    path: "/opentelemetry.proto.collector.metrics.v1.MetricsService/Export",
    endpoint_var: crate::metric::OTEL_EXPORTER_OTLP_METRICS_ENDPOINT,
    timeout_var: crate::metric::OTEL_EXPORTER_OTLP_METRICS_TIMEOUT,
    headers_var: crate::metric::OTEL_EXPORTER_OTLP_METRICS_HEADERS,
    compression_var: crate::metric::OTEL_EXPORTER_OTLP_METRICS_COMPRESSION,
    partial_success: metrics_partial_success,
};

/// Logs: `opentelemetry.proto.collector.logs.v1.LogsService/Export`.
#[cfg(feature = "logs")]
pub const LOGS: Signal = Signal {
    kind: SignalKind::Logs,
    type_name: "log",
    service: "opentelemetry.proto.collector.logs.v1.LogsService",
    method: "Export",
    path: "/opentelemetry.proto.collector.logs.v1.LogsService/Export",
    endpoint_var: crate::logs::OTEL_EXPORTER_OTLP_LOGS_ENDPOINT,
    timeout_var: crate::logs::OTEL_EXPORTER_OTLP_LOGS_TIMEOUT,
    headers_var: crate::logs::OTEL_EXPORTER_OTLP_LOGS_HEADERS,
    compression_var: crate::logs::OTEL_EXPORTER_OTLP_LOGS_COMPRESSION,
    partial_success: logs_partial_success,
};

#[cfg(feature = "trace")]
fn trace_partial_success(response: &[u8]) -> Option<PartialSuccess> {
    use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceResponse;

    let partial = ExportTraceServiceResponse::decode(response)
        .ok()?
        .partial_success?;
    Some(PartialSuccess {
        rejected: partial.rejected_spans,
        error_message: partial.error_message,
    })
}

#[cfg(feature = "metrics")]
fn metrics_partial_success(response: &[u8]) -> Option<PartialSuccess> {
    use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceResponse;

    let partial = ExportMetricsServiceResponse::decode(response)
        .ok()?
        .partial_success?;
    Some(PartialSuccess {
        rejected: partial.rejected_data_points,
        error_message: partial.error_message,
    })
}

#[cfg(feature = "logs")]
fn logs_partial_success(response: &[u8]) -> Option<PartialSuccess> {
    use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceResponse;

    let partial = ExportLogsServiceResponse::decode(response)
        .ok()?
        .partial_success?;
    Some(PartialSuccess {
        rejected: partial.rejected_log_records,
        error_message: partial.error_message,
    })
}
