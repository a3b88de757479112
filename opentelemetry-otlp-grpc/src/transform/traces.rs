use opentelemetry::trace::{self, SpanId, SpanKind};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::{span, status, ResourceSpans, ScopeSpans, Span};

use super::common::{attributes, group_by_resource_and_scope, to_nanos};
use super::Marshal;
use crate::signal::{Signal, TRACES};
use crate::span::{SpanEvent, SpanRecord};

fn span_kind(kind: &SpanKind) -> span::SpanKind {
    match kind {
        SpanKind::Client => span::SpanKind::Client,
        SpanKind::Consumer => span::SpanKind::Consumer,
        SpanKind::Internal => span::SpanKind::Internal,
        SpanKind::Producer => span::SpanKind::Producer,
        SpanKind::Server => span::SpanKind::Server,
        #[allow(unreachable_patterns)]
        _ => span::SpanKind::Unspecified,
    }
}

fn span_status(source: &trace::Status) -> opentelemetry_proto::tonic::trace::v1::Status {
    let (code, message) = match source {
        trace::Status::Ok => (status::StatusCode::Ok, String::new()),
        trace::Status::Unset => (status::StatusCode::Unset, String::new()),
        trace::Status::Error { description } => {
            (status::StatusCode::Error, description.to_string())
        }
        #[allow(unreachable_patterns)]
        _ => (status::StatusCode::Unset, String::new()),
    };

    opentelemetry_proto::tonic::trace::v1::Status {
        code: code.into(),
        message,
    }
}

fn event(event: &SpanEvent) -> span::Event {
    span::Event {
        time_unix_nano: to_nanos(event.timestamp),
        name: event.name.to_string(),
        attributes: attributes(&event.attributes),
        ..Default::default()
    }
}

fn span(record: &SpanRecord) -> Span {
    Span {
        trace_id: record.trace_id.to_bytes().to_vec(),
        span_id: record.span_id.to_bytes().to_vec(),
        parent_span_id: if record.parent_span_id != SpanId::INVALID {
            record.parent_span_id.to_bytes().to_vec()
        } else {
            vec![]
        },
        name: record.name.to_string(),
        kind: span_kind(&record.kind) as i32,
        start_time_unix_nano: to_nanos(record.start_time),
        end_time_unix_nano: to_nanos(record.end_time),
        attributes: attributes(&record.attributes),
        events: record.events.iter().map(event).collect(),
        status: Some(span_status(&record.status)),
        ..Default::default()
    }
}

impl Marshal for SpanRecord {
    type ResourceGroup = ResourceSpans;
    type Request = ExportTraceServiceRequest;

    const SIGNAL: &'static Signal = &TRACES;

    fn resource_groups(batch: &[Self]) -> Vec<ResourceSpans> {
        group_by_resource_and_scope(batch, |r| (&r.resource, &r.scope), span)
            .into_iter()
            .map(|bucket| ResourceSpans {
                resource: Some(bucket.resource),
                schema_url: bucket.schema_url,
                scope_spans: bucket
                    .scopes
                    .into_iter()
                    .map(|scope| ScopeSpans {
                        scope: Some(scope.scope),
                        schema_url: scope.schema_url,
                        spans: scope.items,
                    })
                    .collect(),
            })
            .collect()
    }

    fn request(resource_spans: Vec<ResourceSpans>) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest { resource_spans }
    }

    fn into_resource_groups(request: ExportTraceServiceRequest) -> Vec<ResourceSpans> {
        request.resource_spans
    }
}
