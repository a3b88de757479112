use opentelemetry::logs::{AnyValue as LogsAnyValue, Severity};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{
    any_value::Value, AnyValue, ArrayValue, KeyValue, KeyValueList,
};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs, SeverityNumber};

use super::common::{attributes, group_by_resource_and_scope, to_nanos};
use super::Marshal;
use crate::logs::LogRecord as Record;
use crate::signal::{Signal, LOGS};

/// Map entries are sorted by key, the API keeps them in a hash map.
fn any_value(value: &LogsAnyValue) -> AnyValue {
    let value = match value {
        LogsAnyValue::Double(f) => Some(Value::DoubleValue(*f)),
        LogsAnyValue::Int(i) => Some(Value::IntValue(*i)),
        LogsAnyValue::String(s) => Some(Value::StringValue(s.as_str().to_owned())),
        LogsAnyValue::Boolean(b) => Some(Value::BoolValue(*b)),
        LogsAnyValue::Bytes(v) => Some(Value::BytesValue(v.to_vec())),
        LogsAnyValue::ListAny(v) => Some(Value::ArrayValue(ArrayValue {
            values: v.iter().map(any_value).collect(),
        })),
        LogsAnyValue::Map(m) => {
            let mut values: Vec<KeyValue> = m
                .iter()
                .map(|(key, value)| KeyValue {
                    key: key.as_str().to_string(),
                    value: Some(any_value(value)),
                })
                .collect();
            values.sort_by(|a, b| a.key.cmp(&b.key));
            Some(Value::KvlistValue(KeyValueList { values }))
        }
        #[allow(unreachable_patterns)]
        _ => None,
    };

    AnyValue { value }
}

fn severity_number(severity: Option<Severity>) -> SeverityNumber {
    match severity {
        Some(Severity::Trace) => SeverityNumber::Trace,
        Some(Severity::Trace2) => SeverityNumber::Trace2,
        Some(Severity::Trace3) => SeverityNumber::Trace3,
        Some(Severity::Trace4) => SeverityNumber::Trace4,
        Some(Severity::Debug) => SeverityNumber::Debug,
        Some(Severity::Debug2) => SeverityNumber::Debug2,
        Some(Severity::Debug3) => SeverityNumber::Debug3,
        Some(Severity::Debug4) => SeverityNumber::Debug4,
        Some(Severity::Info) => SeverityNumber::Info,
        Some(Severity::Info2) => SeverityNumber::Info2,
        Some(Severity::Info3) => SeverityNumber::Info3,
        Some(Severity::Info4) => SeverityNumber::Info4,
        Some(Severity::Warn) => SeverityNumber::Warn,
        Some(Severity::Warn2) => SeverityNumber::Warn2,
        Some(Severity::Warn3) => SeverityNumber::Warn3,
        Some(Severity::Warn4) => SeverityNumber::Warn4,
        Some(Severity::Error) => SeverityNumber::Error,
        Some(Severity::Error2) => SeverityNumber::Error2,
        Some(Severity::Error3) => SeverityNumber::Error3,
        Some(Severity::Error4) => SeverityNumber::Error4,
        Some(Severity::Fatal) => SeverityNumber::Fatal,
        Some(Severity::Fatal2) => SeverityNumber::Fatal2,
        Some(Severity::Fatal3) => SeverityNumber::Fatal3,
        Some(Severity::Fatal4) => SeverityNumber::Fatal4,
        _ => SeverityNumber::Unspecified,
    }
}

fn log_record(record: &Record) -> LogRecord {
    let (trace_id, span_id) = record
        .trace_context
        .map(|(trace_id, span_id)| {
            (
                trace_id.to_bytes().to_vec(),
                span_id.to_bytes().to_vec(),
            )
        })
        .unwrap_or_default();

    LogRecord {
        time_unix_nano: record.timestamp.map(to_nanos).unwrap_or_default(),
        observed_time_unix_nano: to_nanos(record.observed_timestamp),
        severity_number: severity_number(record.severity).into(),
        severity_text: record.severity_text.clone().unwrap_or_default(),
        event_name: record.event_name.clone().unwrap_or_default(),
        body: record.body.as_ref().map(any_value),
        attributes: attributes(&record.attributes),
        trace_id,
        span_id,
        ..Default::default()
    }
}

impl Marshal for Record {
    type ResourceGroup = ResourceLogs;
    type Request = ExportLogsServiceRequest;

    const SIGNAL: &'static Signal = &LOGS;

    fn resource_groups(batch: &[Self]) -> Vec<ResourceLogs> {
        group_by_resource_and_scope(batch, |r| (&r.resource, &r.scope), log_record)
            .into_iter()
            .map(|bucket| ResourceLogs {
                resource: Some(bucket.resource),
                schema_url: bucket.schema_url,
                scope_logs: bucket
                    .scopes
                    .into_iter()
                    .map(|scope| ScopeLogs {
                        scope: Some(scope.scope),
                        schema_url: scope.schema_url,
                        log_records: scope.items,
                    })
                    .collect(),
            })
            .collect()
    }

    fn request(resource_logs: Vec<ResourceLogs>) -> ExportLogsServiceRequest {
        ExportLogsServiceRequest { resource_logs }
    }

    fn into_resource_groups(request: ExportLogsServiceRequest) -> Vec<ResourceLogs> {
        request.resource_logs
    }
}
