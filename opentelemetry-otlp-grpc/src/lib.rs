//! A unary gRPC exporter for the [OpenTelemetry Protocol (OTLP)].
//!
//! [OpenTelemetry Protocol (OTLP)]: https://github.com/open-telemetry/opentelemetry-proto
//!
//! One exporter implementation, [`GrpcExporter`], sends batches of spans,
//! metric points or log records to a collector's `TraceService`,
//! `MetricsService` or `LogsService`. Each export is a single attempt bounded
//! by its own deadline; there is no retry. Calls never block and never fail
//! synchronously: the outcome is delivered through a [`CompletionHandle`] and
//! failure details are written to the log through `tracing` (feature
//! `internal-logs`, enabled by default).
//!
//! ```no_run
//! # #[cfg(feature = "trace")]
//! # {
//! use std::time::{Duration, SystemTime};
//!
//! use opentelemetry::trace::{SpanId, TraceId};
//! use opentelemetry::InstrumentationScope;
//! use opentelemetry_otlp_grpc::{SpanExporter, SpanRecord, WithExportConfig};
//! use opentelemetry_sdk::Resource;
//!
//! # async fn run() -> Result<(), opentelemetry_otlp_grpc::ExporterBuildError> {
//! let exporter = SpanExporter::builder()
//!     .with_endpoint("http://localhost:4317")
//!     .with_timeout(Duration::from_secs(3))
//!     .build()?;
//!
//! let span = SpanRecord::new(
//!     Resource::builder_empty().build(),
//!     InstrumentationScope::builder("checkout").build(),
//!     TraceId::from_bytes(1u128.to_be_bytes()),
//!     SpanId::from_bytes(1u64.to_be_bytes()),
//!     "charge-card",
//!     SystemTime::now(),
//! );
//!
//! let outcome = exporter.export(&[span]).join(Duration::from_secs(10)).await;
//! if !outcome.is_success() {
//!     // details were logged
//! }
//!
//! let _ = exporter.shutdown().await;
//! # Ok(())
//! # }
//! # }
//! ```
//!
//! # Configuration
//!
//! Builder values take precedence over the environment:
//!
//! | Setting     | Variables                                                                   | Default                 |
//! |-------------|-----------------------------------------------------------------------------|-------------------------|
//! | endpoint    | `OTEL_EXPORTER_OTLP_{TRACES,METRICS,LOGS}_ENDPOINT`, `OTEL_EXPORTER_OTLP_ENDPOINT`       | `http://localhost:4317` |
//! | timeout     | `OTEL_EXPORTER_OTLP_{TRACES,METRICS,LOGS}_TIMEOUT`, `OTEL_EXPORTER_OTLP_TIMEOUT` (ms)    | 10 seconds              |
//! | headers     | `OTEL_EXPORTER_OTLP_{TRACES,METRICS,LOGS}_HEADERS`, `OTEL_EXPORTER_OTLP_HEADERS`         | `User-Agent` only       |
//! | compression | `OTEL_EXPORTER_OTLP_{TRACES,METRICS,LOGS}_COMPRESSION`, `OTEL_EXPORTER_OTLP_COMPRESSION` | none                    |
//!
//! # Feature Flags
//!
//! * `trace`, `metrics`, `logs`: the signals to support. All on by default.
//! * `internal-logs`: emit diagnostics through `tracing`. On by default.
//! * `gzip-tonic`, `zstd-tonic`: gRPC compression.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(elided_lifetimes_in_paths)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

#[macro_use]
mod internal_logging;

mod classify;
mod deadline;
mod error;
mod exporter;
mod lifecycle;
mod result;
mod signal;
mod transform;

#[cfg(feature = "logs")]
mod logs;
#[cfg(feature = "metrics")]
mod metric;
#[cfg(feature = "trace")]
mod span;

pub use crate::classify::{classify, Classification, DiagnosticLevel, GrpcStatus};
pub use crate::deadline::{Deadline, DeadlinePolicy};
pub use crate::error::{ExporterBuildError, TransportError};
pub use crate::exporter::tonic::{
    ExportStats, GrpcExporter, GrpcExporterBuilder, HasTonicConfig, TonicConfig, WithTonicConfig,
};
pub use crate::exporter::{
    Compression, ExportConfig, HasExportConfig, WithExportConfig, OTEL_EXPORTER_OTLP_COMPRESSION,
    OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_GRPC_ENDPOINT_DEFAULT,
    OTEL_EXPORTER_OTLP_HEADERS, OTEL_EXPORTER_OTLP_TIMEOUT, OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT,
};
pub use crate::lifecycle::ExporterState;
pub use crate::result::{CompletionHandle, ExportOutcome, FailureReason};
pub use crate::signal::{PartialSuccess, Signal, SignalKind};
pub use crate::transform::Marshal;

#[cfg(feature = "logs")]
pub use crate::signal::LOGS;
#[cfg(feature = "metrics")]
pub use crate::signal::METRICS;
#[cfg(feature = "trace")]
pub use crate::signal::TRACES;

#[cfg(feature = "logs")]
#[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
pub use crate::logs::{
    LogExporter, LogRecord, OTEL_EXPORTER_OTLP_LOGS_COMPRESSION, OTEL_EXPORTER_OTLP_LOGS_ENDPOINT,
    OTEL_EXPORTER_OTLP_LOGS_HEADERS, OTEL_EXPORTER_OTLP_LOGS_TIMEOUT,
};

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub use crate::metric::{
    AggregationTemporality, MetricData, MetricExporter, MetricPoint, NumberValue,
    OTEL_EXPORTER_OTLP_METRICS_COMPRESSION, OTEL_EXPORTER_OTLP_METRICS_ENDPOINT,
    OTEL_EXPORTER_OTLP_METRICS_HEADERS, OTEL_EXPORTER_OTLP_METRICS_TIMEOUT,
};

#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub use crate::span::{
    SpanEvent, SpanExporter, SpanRecord, OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
    OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, OTEL_EXPORTER_OTLP_TRACES_HEADERS,
    OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
};
