use std::time::Duration;

use thiserror::Error;

use crate::classify::GrpcStatus;
use crate::exporter::Compression;

#[derive(Error, Debug)]
/// Errors that can occur while building an exporter.
// Non-exhaustive to allow for future expansion without breaking changes.
#[non_exhaustive]
pub enum ExporterBuildError {
    /// Unsupported compression algorithm.
    #[error("unsupported compression algorithm '{0}'")]
    UnsupportedCompressionAlgorithm(String),

    /// Feature required to use the specified compression algorithm.
    #[cfg(any(not(feature = "gzip-tonic"), not(feature = "zstd-tonic")))]
    #[error("feature '{0}' is required to use the compression algorithm '{1}'")]
    FeatureRequiredForCompressionAlgorithm(&'static str, Compression),

    /// Invalid URI.
    #[error("invalid URI {0}. Reason {1}")]
    InvalidUri(String, String),

    /// The exporter was built outside of a Tokio runtime.
    #[error("no Tokio runtime is available to drive the exporter")]
    NoAsyncRuntime,

    /// Invalid configuration.
    #[error("{name}: {reason}")]
    InvalidConfig {
        /// The configuration name.
        name: String,
        /// The reason the configuration is invalid.
        reason: String,
    },
}

/// Failure of a single unary call.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The remote (or the gRPC stack on our side) finished the call with a
    /// non-OK status.
    #[error("{0}")]
    Status(GrpcStatus),

    /// No response arrived before the call's deadline.
    #[error("deadline of {}ms exceeded", .0.as_millis())]
    DeadlineExceeded(Duration),
}

impl TransportError {
    /// The status this failure is classified by.
    ///
    /// A locally enforced deadline maps to `DEADLINE_EXCEEDED`.
    pub fn status(&self) -> GrpcStatus {
        match self {
            TransportError::Status(status) => status.clone(),
            TransportError::DeadlineExceeded(_) => {
                GrpcStatus::new(tonic::Code::DeadlineExceeded, Some(self.to_string()))
            }
        }
    }
}

impl From<tonic::Status> for TransportError {
    fn from(status: tonic::Status) -> Self {
        TransportError::Status(GrpcStatus::from(&status))
    }
}
