use std::collections::HashMap;

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{
    metric, number_data_point, AggregationTemporality as ProtoTemporality, Gauge, Histogram,
    HistogramDataPoint, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum,
};

use super::common::{attributes, group_by_resource_and_scope, to_nanos};
use super::Marshal;
use crate::metric::{AggregationTemporality, MetricData, MetricPoint, NumberValue};
use crate::signal::{Signal, METRICS};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Shape {
    Gauge,
    Sum(AggregationTemporality, bool),
    Histogram(AggregationTemporality),
}

impl From<&MetricData> for Shape {
    fn from(data: &MetricData) -> Self {
        match data {
            MetricData::Gauge(_) => Shape::Gauge,
            MetricData::Sum {
                temporality,
                is_monotonic,
                ..
            } => Shape::Sum(*temporality, *is_monotonic),
            MetricData::Histogram { temporality, .. } => Shape::Histogram(*temporality),
        }
    }
}

impl From<AggregationTemporality> for ProtoTemporality {
    fn from(temporality: AggregationTemporality) -> Self {
        match temporality {
            AggregationTemporality::Delta => ProtoTemporality::Delta,
            AggregationTemporality::Cumulative => ProtoTemporality::Cumulative,
        }
    }
}

fn empty_metric(point: &MetricPoint) -> Metric {
    let data = match Shape::from(&point.data) {
        Shape::Gauge => metric::Data::Gauge(Gauge {
            data_points: Vec::new(),
        }),
        Shape::Sum(temporality, is_monotonic) => metric::Data::Sum(Sum {
            data_points: Vec::new(),
            aggregation_temporality: ProtoTemporality::from(temporality).into(),
            is_monotonic,
        }),
        Shape::Histogram(temporality) => metric::Data::Histogram(Histogram {
            data_points: Vec::new(),
            aggregation_temporality: ProtoTemporality::from(temporality).into(),
        }),
    };

    Metric {
        name: point.name.to_string(),
        description: point.description.to_string(),
        unit: point.unit.to_string(),
        data: Some(data),
        ..Default::default()
    }
}

fn number_point(point: &MetricPoint, value: NumberValue) -> NumberDataPoint {
    NumberDataPoint {
        attributes: attributes(&point.attributes),
        start_time_unix_nano: point.start_time.map(to_nanos).unwrap_or_default(),
        time_unix_nano: to_nanos(point.time),
        value: Some(match value {
            NumberValue::I64(v) => number_data_point::Value::AsInt(v),
            NumberValue::F64(v) => number_data_point::Value::AsDouble(v),
        }),
        ..Default::default()
    }
}

fn push_point(metric: &mut Metric, point: &MetricPoint) {
    match (&mut metric.data, &point.data) {
        (Some(metric::Data::Gauge(gauge)), MetricData::Gauge(value)) => {
            gauge.data_points.push(number_point(point, *value))
        }
        (Some(metric::Data::Sum(sum)), MetricData::Sum { value, .. }) => {
            sum.data_points.push(number_point(point, *value))
        }
        (
            Some(metric::Data::Histogram(histogram)),
            MetricData::Histogram {
                count,
                sum,
                min,
                max,
                bounds,
                bucket_counts,
                ..
            },
        ) => histogram.data_points.push(HistogramDataPoint {
            attributes: attributes(&point.attributes),
            start_time_unix_nano: point.start_time.map(to_nanos).unwrap_or_default(),
            time_unix_nano: to_nanos(point.time),
            count: *count,
            sum: *sum,
            min: *min,
            max: *max,
            explicit_bounds: bounds.clone(),
            bucket_counts: bucket_counts.clone(),
            ..Default::default()
        }),
        // Metrics are keyed by shape, so the data always matches.
        _ => {}
    }
}

/// Merge the points of one scope into metrics, one per stream, in first-seen order.
fn metrics(points: Vec<&MetricPoint>) -> Vec<Metric> {
    let mut metrics: Vec<Metric> = Vec::new();
    let mut index: HashMap<(&str, &str, &str, Shape), usize> = HashMap::new();

    for point in points {
        let key = (
            point.name.as_ref(),
            point.description.as_ref(),
            point.unit.as_ref(),
            Shape::from(&point.data),
        );
        let i = *index.entry(key).or_insert_with(|| {
            metrics.push(empty_metric(point));
            metrics.len() - 1
        });
        push_point(&mut metrics[i], point);
    }

    metrics
}

impl Marshal for MetricPoint {
    type ResourceGroup = ResourceMetrics;
    type Request = ExportMetricsServiceRequest;

    const SIGNAL: &'static Signal = &METRICS;

    fn resource_groups(batch: &[Self]) -> Vec<ResourceMetrics> {
        group_by_resource_and_scope(batch, |p| (&p.resource, &p.scope), |p| p)
            .into_iter()
            .map(|bucket| ResourceMetrics {
                resource: Some(bucket.resource),
                schema_url: bucket.schema_url,
                scope_metrics: bucket
                    .scopes
                    .into_iter()
                    .map(|scope| ScopeMetrics {
                        scope: Some(scope.scope),
                        schema_url: scope.schema_url,
                        metrics: metrics(scope.items),
                    })
                    .collect(),
            })
            .collect()
    }

    fn request(resource_metrics: Vec<ResourceMetrics>) -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest { resource_metrics }
    }

    fn into_resource_groups(request: ExportMetricsServiceRequest) -> Vec<ResourceMetrics> {
        request.resource_metrics
    }
}
