//! Exporter builder and configuration.
//!
//! Values set programmatically win over environment variables, which win over
//! the defaults below.

use std::env;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ExporterBuildError;

/// Target to which the exporter is going to send signals, defaults to http://localhost:4317.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Default target to which the exporter is going to send signals.
pub const OTEL_EXPORTER_OTLP_GRPC_ENDPOINT_DEFAULT: &str = "http://localhost:4317";
/// Key-value pairs to be used as gRPC metadata on every call.
/// Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
/// Compression algorithm to use, defaults to none.
pub const OTEL_EXPORTER_OTLP_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_COMPRESSION";
/// Max waiting time for the collector to process each batch, in milliseconds.
pub const OTEL_EXPORTER_OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";
/// Default max waiting time for the collector to process each batch.
pub const OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT: Duration = Duration::from_millis(10000);

pub(crate) mod tonic;

/// Configuration shared by all exporters.
#[derive(Debug, Default, Clone)]
pub struct ExportConfig {
    /// The address of the OTLP collector.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub endpoint: Option<String>,

    /// The exporter-wide timeout applied to each export call.
    /// The default value is 10 seconds.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub timeout: Option<Duration>,
}

/// The compression algorithm to use when sending data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    /// Compresses data using gzip.
    Gzip,
    /// Compresses data using zstd.
    Zstd,
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl FromStr for Compression {
    type Err = ExporterBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gzip" => Ok(Compression::Gzip),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(ExporterBuildError::UnsupportedCompressionAlgorithm(
                s.to_string(),
            )),
        }
    }
}

// The first non-empty source wins; an unknown algorithm name is an error.
fn resolve_compression(
    provided_compression: Option<Compression>,
    signal_compression_var: &str,
) -> Result<Option<Compression>, ExporterBuildError> {
    match provided_compression {
        Some(compression) => Ok(Some(compression)),
        None => non_empty_var(signal_compression_var)
            .or_else(|| non_empty_var(OTEL_EXPORTER_OTLP_COMPRESSION))
            .map(|name| name.parse())
            .transpose(),
    }
}

/// default user-agent headers
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::USER_AGENT,
        HeaderValue::from_static(concat!(
            "OTel-OTLP-Grpc-Exporter-Rust/",
            env!("CARGO_PKG_VERSION")
        )),
    );
    headers
}

/// Provide access to the [ExportConfig] field within the exporter builders.
pub trait HasExportConfig {
    /// Return a mutable reference to the [ExportConfig] within the exporter builders.
    fn export_config(&mut self) -> &mut ExportConfig;
}

/// Expose methods to override [ExportConfig].
///
/// This trait will be implemented for every struct that implemented [`HasExportConfig`] trait.
///
/// ## Examples
/// ```no_run
/// # #[cfg(feature = "trace")]
/// # {
/// use opentelemetry_otlp_grpc::{SpanExporter, WithExportConfig};
/// let exporter_builder = SpanExporter::builder().with_endpoint("http://localhost:7201");
/// # }
/// ```
pub trait WithExportConfig {
    /// Set the address of the OTLP collector. If not set or set to empty string, the default address is used.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    fn with_endpoint<T: Into<String>>(self, endpoint: T) -> Self;
    /// Set the exporter-wide timeout of each export call.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    fn with_timeout(self, timeout: Duration) -> Self;
    /// Set export config. This will override all previous configurations.
    ///
    /// Note: Programmatically setting this will override any value set via environment variables.
    fn with_export_config(self, export_config: ExportConfig) -> Self;
}

impl<B: HasExportConfig> WithExportConfig for B {
    fn with_endpoint<T: Into<String>>(mut self, endpoint: T) -> Self {
        self.export_config().endpoint = Some(endpoint.into());
        self
    }

    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.export_config().timeout = Some(timeout);
        self
    }

    fn with_export_config(mut self, exporter_config: ExportConfig) -> Self {
        self.export_config().endpoint = exporter_config.endpoint;
        self.export_config().timeout = exporter_config.timeout;
        self
    }
}

// gRPC endpoints carry no path: the RPC path comes from the service definition.
fn resolve_endpoint(signal_endpoint_var: &str, provided_endpoint: Option<String>) -> String {
    provided_endpoint
        .filter(|endpoint| !endpoint.is_empty())
        .or_else(|| non_empty_var(signal_endpoint_var))
        .or_else(|| non_empty_var(OTEL_EXPORTER_OTLP_ENDPOINT))
        .unwrap_or_else(|| OTEL_EXPORTER_OTLP_GRPC_ENDPOINT_DEFAULT.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

// Variables hold whole milliseconds. Values that do not parse are skipped.
fn resolve_timeout(signal_timeout_var: &str, provided_timeout: Option<Duration>) -> Duration {
    provided_timeout
        .or_else(|| millis_var(signal_timeout_var))
        .or_else(|| millis_var(OTEL_EXPORTER_OTLP_TIMEOUT))
        .unwrap_or(OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT)
}

fn millis_var(name: &str) -> Option<Duration> {
    let millis = env::var(name).ok()?.trim().parse().ok()?;
    Some(Duration::from_millis(millis))
}

/// Extra call headers from the signal's variable, or from
/// `OTEL_EXPORTER_OTLP_HEADERS` when that is unset.
///
/// Entries that do not form a valid HTTP header are dropped.
fn headers_from_env(signal_headers_var: &str) -> HeaderMap {
    let Ok(list) = env::var(signal_headers_var).or_else(|_| env::var(OTEL_EXPORTER_OTLP_HEADERS))
    else {
        return HeaderMap::new();
    };

    parse_header_list(&list)
        .into_iter()
        .filter_map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            let value = HeaderValue::from_str(&value).ok()?;
            Some((name, value))
        })
        .collect()
}

/// Split a `name=value,name=value` list. Both sides are trimmed and entries
/// with an empty side are skipped. Values are percent-decoded when they
/// decode cleanly and kept verbatim otherwise.
fn parse_header_list(list: &str) -> Vec<(&str, String)> {
    list.split(',')
        .filter_map(|entry| {
            let (name, value) = entry.split_once('=')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                return None;
            }
            let value = percent_decode(value).unwrap_or_else(|| value.to_owned());
            Some((name, value))
        })
        .collect()
}

fn percent_decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while let Some(&byte) = bytes.get(pos) {
        if byte != b'%' {
            decoded.push(byte);
            pos += 1;
            continue;
        }
        let hex = bytes.get(pos + 1..pos + 3)?;
        if !hex.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        decoded.push(u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?);
        pos += 3;
    }

    String::from_utf8(decoded).ok()
}
