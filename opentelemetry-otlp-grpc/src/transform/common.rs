use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opentelemetry::{Array, InstrumentationScope, KeyValue, Value};
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, InstrumentationScope as ProtoScope,
    KeyValue as ProtoKeyValue,
};
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;
use opentelemetry_sdk::Resource;
use prost::Message;

pub(crate) fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos() as u64
}

pub(crate) fn attributes<'a>(kvs: impl IntoIterator<Item = &'a KeyValue>) -> Vec<ProtoKeyValue> {
    kvs.into_iter()
        .map(|kv| ProtoKeyValue {
            key: kv.key.as_str().to_string(),
            value: Some(value_to_proto(&kv.value)),
        })
        .collect()
}

pub(crate) fn value_to_proto(value: &Value) -> AnyValue {
    AnyValue {
        value: match value {
            Value::Bool(val) => Some(any_value::Value::BoolValue(*val)),
            Value::I64(val) => Some(any_value::Value::IntValue(*val)),
            Value::F64(val) => Some(any_value::Value::DoubleValue(*val)),
            Value::String(val) => Some(any_value::Value::StringValue(val.as_str().to_owned())),
            Value::Array(array) => Some(any_value::Value::ArrayValue(array_to_proto(array))),
            #[allow(unreachable_patterns)]
            _ => None,
        },
    }
}

fn array_to_proto(array: &Array) -> ArrayValue {
    let values = match array {
        Array::Bool(vals) => vals
            .iter()
            .map(|v| scalar(any_value::Value::BoolValue(*v)))
            .collect(),
        Array::I64(vals) => vals
            .iter()
            .map(|v| scalar(any_value::Value::IntValue(*v)))
            .collect(),
        Array::F64(vals) => vals
            .iter()
            .map(|v| scalar(any_value::Value::DoubleValue(*v)))
            .collect(),
        Array::String(vals) => vals
            .iter()
            .map(|v| scalar(any_value::Value::StringValue(v.as_str().to_owned())))
            .collect(),
        #[allow(unreachable_patterns)]
        _ => Vec::new(),
    };

    ArrayValue { values }
}

pub(crate) fn scalar(value: any_value::Value) -> AnyValue {
    AnyValue { value: Some(value) }
}

/// Resource attributes are sorted by key; the SDK stores them unordered.
fn resource_to_proto(resource: &Resource) -> (ProtoResource, String) {
    let mut attributes: Vec<ProtoKeyValue> = resource
        .iter()
        .map(|(key, value)| ProtoKeyValue {
            key: key.as_str().to_string(),
            value: Some(value_to_proto(value)),
        })
        .collect();
    attributes.sort_by(|a, b| a.key.cmp(&b.key));

    (
        ProtoResource {
            attributes,
            ..Default::default()
        },
        resource
            .schema_url()
            .map(ToString::to_string)
            .unwrap_or_default(),
    )
}

fn scope_to_proto(scope: &InstrumentationScope) -> (ProtoScope, String) {
    (
        ProtoScope {
            name: scope.name().to_string(),
            version: scope.version().map(ToString::to_string).unwrap_or_default(),
            attributes: attributes(scope.attributes()),
            ..Default::default()
        },
        scope.schema_url().map(ToString::to_string).unwrap_or_default(),
    )
}

/// Items sharing one resource.
#[derive(Debug)]
pub(crate) struct ResourceBucket<T> {
    pub(crate) resource: ProtoResource,
    pub(crate) schema_url: String,
    pub(crate) scopes: Vec<ScopeBucket<T>>,
}

/// Items sharing one resource and one instrumentation scope.
#[derive(Debug)]
pub(crate) struct ScopeBucket<T> {
    pub(crate) scope: ProtoScope,
    pub(crate) schema_url: String,
    pub(crate) items: Vec<T>,
}

/// Group `batch` by resource, then by scope.
///
/// Groups appear in the order their first record appears in the batch, and
/// records keep their batch order within a group. Two resources (or scopes)
/// are the same when their encoded form and schema URL are equal.
pub(crate) fn group_by_resource_and_scope<'a, R, T>(
    batch: &'a [R],
    origin: impl Fn(&'a R) -> (&'a Resource, &'a InstrumentationScope),
    mut convert: impl FnMut(&'a R) -> T,
) -> Vec<ResourceBucket<T>> {
    let mut buckets: Vec<ResourceBucket<T>> = Vec::new();
    let mut resource_index: HashMap<(Vec<u8>, String), usize> = HashMap::new();
    let mut scope_index: HashMap<(usize, Vec<u8>, String), usize> = HashMap::new();

    for record in batch {
        let (resource, scope) = origin(record);

        let (proto_resource, resource_schema_url) = resource_to_proto(resource);
        let resource_key = (proto_resource.encode_to_vec(), resource_schema_url.clone());
        let r = *resource_index.entry(resource_key).or_insert_with(|| {
            buckets.push(ResourceBucket {
                resource: proto_resource,
                schema_url: resource_schema_url,
                scopes: Vec::new(),
            });
            buckets.len() - 1
        });

        let (proto_scope, scope_schema_url) = scope_to_proto(scope);
        let scope_key = (r, proto_scope.encode_to_vec(), scope_schema_url.clone());
        let scopes = &mut buckets[r].scopes;
        let s = *scope_index.entry(scope_key).or_insert_with(|| {
            scopes.push(ScopeBucket {
                scope: proto_scope,
                schema_url: scope_schema_url,
                items: Vec::new(),
            });
            scopes.len() - 1
        });

        scopes[s].items.push(convert(record));
    }

    buckets
}
