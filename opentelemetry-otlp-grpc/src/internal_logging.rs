#![allow(unused_macros)]
//! Crate-internal logging macros.
//!
//! Every event is emitted through `tracing` with the crate name as its target,
//! so subscribers can attribute diagnostics to this exporter. The `name:` is a
//! stable event identifier (`GrpcExporter.ExportFailed`, ...). Events that carry
//! a human readable diagnostic pass it as `message = ...`, which becomes the
//! event's message.
//!
//! Nothing is emitted unless the `internal-logs` feature is enabled.

macro_rules! otlp_debug {
    (name: $name:expr $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            tracing::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = $name;
        }
    };
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            tracing::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = ($name, $($value),+);
        }
    };
}

macro_rules! otlp_warn {
    (name: $name:expr, message = $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            tracing::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value,)* "{}", $message);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = ($name, $message $(, $value)*);
        }
    };
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            tracing::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = ($name, $($value),+);
        }
    };
}

macro_rules! otlp_error {
    (name: $name:expr, message = $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            tracing::error!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value,)* "{}", $message);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = ($name, $message $(, $value)*);
        }
    };
}
