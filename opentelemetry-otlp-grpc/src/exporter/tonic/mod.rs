use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

use http::HeaderMap;
use tokio::runtime::Handle;
use tonic::codec::CompressionEncoding;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;

use super::{
    default_headers, headers_from_env, resolve_compression, resolve_endpoint, resolve_timeout,
    Compression, ExportConfig, HasExportConfig,
};
use crate::deadline::DeadlinePolicy;
use crate::error::ExporterBuildError;
use crate::transform::Marshal;

mod client;
mod codec;
mod transport;

pub use client::{ExportStats, GrpcExporter};
use transport::GrpcTransport;

/// Configuration for [tonic]
///
/// [tonic]: https://github.com/hyperium/tonic
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct TonicConfig {
    /// Custom metadata entries to send to the collector.
    pub(crate) metadata: Option<MetadataMap>,
    /// The compression algorithm to use when communicating with the collector.
    pub(crate) compression: Option<Compression>,
}

impl TryFrom<Compression> for CompressionEncoding {
    type Error = ExporterBuildError;

    fn try_from(value: Compression) -> Result<Self, Self::Error> {
        match value {
            #[cfg(feature = "gzip-tonic")]
            Compression::Gzip => Ok(CompressionEncoding::Gzip),
            #[cfg(not(feature = "gzip-tonic"))]
            Compression::Gzip => Err(ExporterBuildError::FeatureRequiredForCompressionAlgorithm(
                "gzip-tonic",
                Compression::Gzip,
            )),
            #[cfg(feature = "zstd-tonic")]
            Compression::Zstd => Ok(CompressionEncoding::Zstd),
            #[cfg(not(feature = "zstd-tonic"))]
            Compression::Zstd => Err(ExporterBuildError::FeatureRequiredForCompressionAlgorithm(
                "zstd-tonic",
                Compression::Zstd,
            )),
        }
    }
}

/// Builder for a [GrpcExporter].
///
/// ## Examples
///
/// ```no_run
/// # #[cfg(feature = "trace")]
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::time::Duration;
/// use opentelemetry_otlp_grpc::{SpanExporter, WithExportConfig};
///
/// let exporter = SpanExporter::builder()
///     .with_endpoint("http://localhost:4317")
///     .with_timeout(Duration::from_secs(3))
///     .build()?;
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "trace"))]
/// # fn main() {}
/// ```
pub struct GrpcExporterBuilder<T> {
    pub(crate) tonic_config: TonicConfig,
    pub(crate) exporter_config: ExportConfig,
    _record: PhantomData<fn(&[T])>,
}

impl<T> Debug for GrpcExporterBuilder<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcExporterBuilder")
            .field("tonic_config", &self.tonic_config)
            .field("exporter_config", &self.exporter_config)
            .finish()
    }
}

impl<T> Default for GrpcExporterBuilder<T> {
    fn default() -> Self {
        GrpcExporterBuilder {
            tonic_config: TonicConfig {
                metadata: Some(MetadataMap::from_headers(default_headers())),
                compression: None,
            },
            exporter_config: ExportConfig::default(),
            _record: PhantomData,
        }
    }
}

impl<T: Marshal> GrpcExporterBuilder<T> {
    /// Build the exporter.
    ///
    /// Must be called from within a Tokio runtime; the runtime drives every
    /// export. The channel connects lazily, so the collector does not need
    /// to be reachable yet.
    pub fn build(self) -> Result<GrpcExporter<T>, ExporterBuildError> {
        let signal = T::SIGNAL;
        otlp_debug!(name: "GrpcExporter.Building", signal = signal.type_name);

        let runtime = Handle::try_current().map_err(|_| ExporterBuildError::NoAsyncRuntime)?;

        let compression = resolve_compression(self.tonic_config.compression, signal.compression_var)?
            .map(CompressionEncoding::try_from)
            .transpose()?;

        let env_headers = headers_from_env(signal.headers_var);
        let env_header_names = format!("{:?}", env_headers.keys().collect::<Vec<_>>());
        let metadata = overlay_headers(self.tonic_config.metadata.unwrap_or_default(), env_headers);

        let endpoint = resolve_endpoint(signal.endpoint_var, self.exporter_config.endpoint);
        let timeout = resolve_timeout(signal.timeout_var, self.exporter_config.timeout);

        let channel = Channel::from_shared(endpoint.clone())
            .map_err(|e| ExporterBuildError::InvalidUri(endpoint.clone(), e.to_string()))?
            .connect_lazy();

        otlp_debug!(
            name: "GrpcExporter.Built",
            signal = signal.type_name,
            endpoint = endpoint.as_str(),
            timeout_in_millisecs = timeout.as_millis() as u64,
            compression = format!("{compression:?}"),
            env_headers = env_header_names,
        );

        Ok(GrpcExporter::from_parts(
            signal,
            GrpcTransport::new(channel, metadata, compression),
            DeadlinePolicy::new(Some(timeout)),
            runtime,
        ))
    }
}

// Entries in `headers` replace same-named entries of `metadata`.
fn overlay_headers(metadata: MetadataMap, headers: HeaderMap) -> MetadataMap {
    if headers.is_empty() {
        return metadata;
    }
    let mut merged = metadata.into_headers();
    merged.extend(headers);
    MetadataMap::from_headers(merged)
}

impl<T> HasExportConfig for GrpcExporterBuilder<T> {
    fn export_config(&mut self) -> &mut ExportConfig {
        &mut self.exporter_config
    }
}

/// Expose interface for modifying [TonicConfig] fields within the exporter builders.
pub trait HasTonicConfig {
    /// Return a mutable reference to the export config within the exporter builders.
    fn tonic_config(&mut self) -> &mut TonicConfig;
}

impl<T> HasTonicConfig for GrpcExporterBuilder<T> {
    fn tonic_config(&mut self) -> &mut TonicConfig {
        &mut self.tonic_config
    }
}

/// Expose methods to override [TonicConfig].
///
/// This trait will be implemented for every struct that implemented [`HasTonicConfig`] trait.
pub trait WithTonicConfig {
    /// Set custom metadata entries to send to the collector.
    fn with_metadata(self, metadata: MetadataMap) -> Self;

    /// Set the compression algorithm to use when communicating with the collector.
    fn with_compression(self, compression: Compression) -> Self;
}

impl<B: HasTonicConfig> WithTonicConfig for B {
    fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        let config = self.tonic_config();
        let current = config.metadata.take().unwrap_or_default();
        config.metadata = Some(overlay_headers(current, metadata.into_headers()));
        self
    }

    fn with_compression(mut self, compression: Compression) -> Self {
        self.tonic_config().compression = Some(compression);
        self
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use tonic::metadata::MetadataMap;

    use super::*;

    type Builder = GrpcExporterBuilder<()>;

    fn metadata(entries: &[(&'static str, &'static str)]) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        for (key, value) in entries {
            metadata.insert(*key, value.parse().unwrap());
        }
        metadata
    }

    #[test]
    fn with_metadata_overlays_defaults() {
        let builder = Builder::default()
            .with_metadata(metadata(&[("x-tenant", "acme")]))
            .with_metadata(metadata(&[("user-agent", "checkout/2.1"), ("x-tenant", "globex")]));

        let result = builder.tonic_config.metadata.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("x-tenant").unwrap(), "globex");
        assert_eq!(result.get("user-agent").unwrap(), "checkout/2.1");
    }

    #[test]
    fn env_headers_win_over_builder_metadata() {
        let env_headers = HeaderMap::from_iter([
            ("x-tenant".parse().unwrap(), HeaderValue::from_static("from-env")),
            ("x-region".parse().unwrap(), HeaderValue::from_static("eu")),
        ]);

        let merged = overlay_headers(
            metadata(&[("x-tenant", "from-builder"), ("x-team", "payments")]),
            env_headers,
        );

        assert_eq!(merged.get("x-tenant").unwrap(), "from-env");
        assert_eq!(merged.get("x-region").unwrap(), "eu");
        assert_eq!(merged.get("x-team").unwrap(), "payments");
        assert_eq!(overlay_headers(metadata(&[("a", "1")]), HeaderMap::new()).len(), 1);
    }

    #[test]
    fn compression_is_recorded_and_gated_by_feature() {
        let builder = Builder::default().with_compression(Compression::Zstd);
        assert_eq!(builder.tonic_config.compression, Some(Compression::Zstd));

        assert_eq!(
            CompressionEncoding::try_from(Compression::Gzip).is_ok(),
            cfg!(feature = "gzip-tonic")
        );
        assert_eq!(
            CompressionEncoding::try_from(Compression::Zstd).is_ok(),
            cfg!(feature = "zstd-tonic")
        );
    }

    #[cfg(feature = "logs")]
    #[test]
    fn build_outside_runtime_fails() {
        let result = crate::LogExporter::builder().build();
        assert!(matches!(result, Err(ExporterBuildError::NoAsyncRuntime)));
    }

    #[cfg(feature = "logs")]
    #[tokio::test]
    async fn endpoint_without_scheme_is_rejected() {
        use crate::WithExportConfig;

        let result = crate::LogExporter::builder()
            .with_endpoint("collector.internal/v1")
            .build();

        assert!(matches!(
            result,
            Err(ExporterBuildError::InvalidUri(ref endpoint, _)) if endpoint == "collector.internal/v1"
        ));
    }

    #[cfg(all(feature = "metrics", not(feature = "gzip-tonic")))]
    #[tokio::test]
    async fn compression_without_feature_fails() {
        let result = crate::MetricExporter::builder()
            .with_compression(Compression::Gzip)
            .build();
        assert!(matches!(
            result,
            Err(ExporterBuildError::FeatureRequiredForCompressionAlgorithm(
                "gzip-tonic",
                Compression::Gzip
            ))
        ));
    }
}
