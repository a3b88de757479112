//! Conversion of in-memory records into OTLP request envelopes.
//!
//! Records are grouped by resource, then by instrumentation scope, in the
//! order they first appear in the batch. Equal batches encode to equal bytes.

use bytes::{Bytes, BytesMut};
use prost::{DecodeError, EncodeError, Message};

use crate::signal::Signal;

pub(crate) mod common;

#[cfg(feature = "logs")]
pub(crate) mod logs;
#[cfg(feature = "metrics")]
pub(crate) mod metrics;
#[cfg(feature = "trace")]
pub(crate) mod traces;

/// A record type that can be exported by [`GrpcExporter`](crate::GrpcExporter).
///
/// Implemented for [`SpanRecord`](crate::SpanRecord),
/// [`MetricPoint`](crate::MetricPoint) and [`LogRecord`](crate::LogRecord).
pub trait Marshal: Sized {
    /// The per-resource group of the envelope (`ResourceSpans`, ...).
    type ResourceGroup: Message + Default + Clone + PartialEq;

    /// The request envelope sent to the collector.
    type Request: Message + Default;

    /// The signal row this record type is exported with.
    const SIGNAL: &'static Signal;

    /// Group `batch` into resource groups. Does not consume the batch.
    fn resource_groups(batch: &[Self]) -> Vec<Self::ResourceGroup>;

    /// Wrap resource groups into a request envelope.
    fn request(resource_groups: Vec<Self::ResourceGroup>) -> Self::Request;

    /// Unwrap the resource groups of a request envelope.
    fn into_resource_groups(request: Self::Request) -> Vec<Self::ResourceGroup>;

    /// Encode `batch` as a request envelope.
    ///
    /// Fails only if the encoder faults, which a buffer sized from
    /// `encoded_len` rules out.
    fn marshal(batch: &[Self]) -> Result<Bytes, EncodeError> {
        let request = Self::request(Self::resource_groups(batch));
        let mut buf = BytesMut::with_capacity(request.encoded_len());
        request.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode the resource groups of an encoded request envelope.
    fn unmarshal(payload: &[u8]) -> Result<Vec<Self::ResourceGroup>, DecodeError> {
        Self::Request::decode(payload).map(Self::into_resource_groups)
    }
}
