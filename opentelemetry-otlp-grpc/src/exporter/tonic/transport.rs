use bytes::Bytes;
use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::codec::CompressionEncoding;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::{Code, GrpcMethod, Request, Status, TimeoutExpired};

use super::codec::BytesCodec;
use crate::deadline::Deadline;
use crate::error::TransportError;
use crate::signal::Signal;

/// Issues single unary calls carrying pre-encoded envelopes.
///
/// Cloning is cheap and shares the underlying channel.
#[derive(Clone, Debug)]
pub(crate) struct GrpcTransport {
    grpc: Grpc<Channel>,
    metadata: MetadataMap,
}

impl GrpcTransport {
    pub(crate) fn new(
        channel: Channel,
        metadata: MetadataMap,
        compression: Option<CompressionEncoding>,
    ) -> Self {
        let mut grpc = Grpc::new(channel);
        if let Some(compression) = compression {
            grpc = grpc
                .send_compressed(compression)
                .accept_compressed(compression);
        }

        GrpcTransport { grpc, metadata }
    }

    /// Send `payload` to the signal's RPC path and wait for the response
    /// envelope, at most until `deadline`.
    ///
    /// Exactly one attempt is made, even when the deadline has already
    /// passed. Non-OK statuses come back as [`TransportError::Status`].
    pub(crate) async fn send(
        &self,
        signal: &'static Signal,
        payload: Bytes,
        deadline: Deadline,
    ) -> Result<Bytes, TransportError> {
        let mut grpc = self.grpc.clone();

        let mut request = Request::new(payload);
        *request.metadata_mut() = self.metadata.clone();
        // Lets the collector give up at the same time we do.
        request.set_timeout(deadline.remaining());
        request
            .extensions_mut()
            .insert(GrpcMethod::new(signal.service, signal.method));

        let call = async move {
            grpc.ready()
                .await
                .map_err(|e| Status::unknown(format!("Service was not ready: {e}")))?;
            grpc.unary(request, PathAndQuery::from_static(signal.path), BytesCodec)
                .await
        };

        match tokio::time::timeout_at(deadline.expires_at(), call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) if expired_locally(&status, &deadline) => {
                Err(TransportError::DeadlineExceeded(deadline.timeout()))
            }
            Ok(Err(status)) => Err(TransportError::from(status)),
            Err(_elapsed) => Err(TransportError::DeadlineExceeded(deadline.timeout())),
        }
    }
}

/// Whether `status` is the channel's own `grpc-timeout` enforcement firing
/// rather than an answer from the collector.
///
/// The channel reports that as CANCELLED and can win the race against
/// `timeout_at`, which would otherwise mask the expiry.
fn expired_locally(status: &Status, deadline: &Deadline) -> bool {
    status.code() == Code::Cancelled
        && (deadline.remaining().is_zero()
            || status.message() == TimeoutExpired(()).to_string())
}
