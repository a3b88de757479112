//! # OTLP - Metric Exporter
//!
//! Defines a [MetricExporter] to send [MetricPoint]s to a collector's
//! `MetricsService`.

use std::borrow::Cow;
use std::time::SystemTime;

use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_sdk::Resource;

use crate::exporter::tonic::GrpcExporter;

/// Target to which the exporter is going to send metrics, defaults to http://localhost:4317.
pub const OTEL_EXPORTER_OTLP_METRICS_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT";
/// Max waiting time for the collector to process each metrics batch, in milliseconds.
pub const OTEL_EXPORTER_OTLP_METRICS_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_METRICS_TIMEOUT";
/// Compression algorithm to use, defaults to none.
pub const OTEL_EXPORTER_OTLP_METRICS_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_METRICS_COMPRESSION";
/// Key-value pairs to be used as metadata associated with gRPC requests
/// for sending metrics.
/// Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_METRICS_HEADERS: &str = "OTEL_EXPORTER_OTLP_METRICS_HEADERS";

/// Exporter that sends [MetricPoint]s to `MetricsService/Export`.
pub type MetricExporter = GrpcExporter<MetricPoint>;

/// One data point of a named metric stream.
///
/// Points of the same stream (same scope, name, description, unit and data
/// shape) are exported together as a single OTLP metric.
#[derive(Clone, Debug)]
pub struct MetricPoint {
    /// The entity that produced the point.
    pub resource: Resource,
    /// The instrumentation scope that produced the point.
    pub scope: InstrumentationScope,
    /// Metric name.
    pub name: Cow<'static, str>,
    /// Metric description.
    pub description: Cow<'static, str>,
    /// Metric unit.
    pub unit: Cow<'static, str>,
    /// Attributes identifying the point within the stream.
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation interval, for cumulative and delta data.
    pub start_time: Option<SystemTime>,
    /// When the point was recorded.
    pub time: SystemTime,
    /// The aggregated value.
    pub data: MetricData,
}

/// The aggregated value of a [MetricPoint].
#[derive(Clone, Debug, PartialEq)]
pub enum MetricData {
    /// Last observed value.
    Gauge(NumberValue),
    /// Sum of measurements.
    Sum {
        /// The sum.
        value: NumberValue,
        /// How the sum relates to previous reports.
        temporality: AggregationTemporality,
        /// Whether the sum only ever increases.
        is_monotonic: bool,
    },
    /// Explicit bucket histogram.
    Histogram {
        /// Number of measurements.
        count: u64,
        /// Sum of measurements, if tracked.
        sum: Option<f64>,
        /// Smallest measurement, if tracked.
        min: Option<f64>,
        /// Largest measurement, if tracked.
        max: Option<f64>,
        /// Upper bounds of the buckets, one fewer than `bucket_counts`.
        bounds: Vec<f64>,
        /// Measurement count per bucket.
        bucket_counts: Vec<u64>,
        /// How the histogram relates to previous reports.
        temporality: AggregationTemporality,
    },
}

/// A measurement value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberValue {
    /// Integer value.
    I64(i64),
    /// Floating point value.
    F64(f64),
}

impl From<i64> for NumberValue {
    fn from(value: i64) -> Self {
        NumberValue::I64(value)
    }
}

impl From<f64> for NumberValue {
    fn from(value: f64) -> Self {
        NumberValue::F64(value)
    }
}

/// Whether values are reported since the last report or since start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationTemporality {
    /// Values since the last report.
    Delta,
    /// Values since the start of the stream.
    Cumulative,
}

impl MetricPoint {
    /// A gauge point with no attributes recorded at `time`.
    pub fn gauge(
        resource: Resource,
        scope: InstrumentationScope,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<NumberValue>,
        time: SystemTime,
    ) -> Self {
        MetricPoint {
            resource,
            scope,
            name: name.into(),
            description: Cow::Borrowed(""),
            unit: Cow::Borrowed(""),
            attributes: Vec::new(),
            start_time: None,
            time,
            data: MetricData::Gauge(value.into()),
        }
    }
}
