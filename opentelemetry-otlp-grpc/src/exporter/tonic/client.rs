use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;

use super::transport::GrpcTransport;
use super::GrpcExporterBuilder;
use crate::classify::{classify, Classification, DiagnosticLevel};
use crate::deadline::DeadlinePolicy;
use crate::error::TransportError;
use crate::exporter::ExportConfig;
use crate::lifecycle::{ExporterState, Lifecycle};
use crate::result::{CompletionHandle, ExportOutcome, FailureReason};
use crate::signal::{PartialSuccess, Signal};
use crate::transform::Marshal;
use crate::WithExportConfig;

/// Sends batches of `T` to an OTLP collector over unary gRPC calls.
///
/// Every call to [`export`](GrpcExporter::export) is a single attempt bounded
/// by its own deadline. Outcomes are delivered through a [`CompletionHandle`];
/// failure details go to the log. Clones share the same channel and
/// lifecycle.
pub struct GrpcExporter<T> {
    inner: Arc<ExporterInner>,
    _record: PhantomData<fn(&[T])>,
}

struct ExporterInner {
    signal: &'static Signal,
    transport: Mutex<Option<GrpcTransport>>,
    deadline: DeadlinePolicy,
    lifecycle: Arc<Lifecycle>,
    runtime: Handle,
    stats: Counters,
}

impl<T> Clone for GrpcExporter<T> {
    fn clone(&self) -> Self {
        GrpcExporter {
            inner: Arc::clone(&self.inner),
            _record: PhantomData,
        }
    }
}

impl<T> Debug for GrpcExporter<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcExporter")
            .field("signal", &self.inner.signal.kind)
            .field("timeout", &self.inner.deadline.timeout())
            .field("state", &self.inner.lifecycle.state())
            .finish()
    }
}

impl<T: Marshal> GrpcExporter<T> {
    /// Create an exporter for `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, crate::ExporterBuildError> {
        Self::builder().with_endpoint(endpoint).build()
    }

    /// Create an exporter for `endpoint` whose calls time out after `timeout`.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, crate::ExporterBuildError> {
        Self::builder()
            .with_export_config(ExportConfig {
                endpoint: Some(endpoint.into()),
                timeout: Some(timeout),
            })
            .build()
    }

    /// A builder with every option unset.
    pub fn builder() -> GrpcExporterBuilder<T> {
        GrpcExporterBuilder::default()
    }

    /// Export `batch` with the exporter-wide timeout.
    ///
    /// Never blocks and never fails synchronously.
    pub fn export(&self, batch: &[T]) -> CompletionHandle {
        self.dispatch(batch, None)
    }

    /// Export `batch`, bounding this call alone by `timeout`.
    pub fn export_with_timeout(&self, batch: &[T], timeout: Duration) -> CompletionHandle {
        self.dispatch(batch, Some(timeout))
    }

    fn dispatch(&self, batch: &[T], call_timeout: Option<Duration>) -> CompletionHandle {
        let inner = &self.inner;
        let signal = inner.signal;

        let Some(guard) = inner.lifecycle.try_enter() else {
            otlp_debug!(name: "GrpcExporter.ExportAfterShutdown", signal = signal.type_name);
            return CompletionHandle::ready(ExportOutcome::Failure(FailureReason::AlreadyShutdown));
        };
        let Some(transport) = inner.transport() else {
            otlp_debug!(name: "GrpcExporter.ExportAfterShutdown", signal = signal.type_name);
            return CompletionHandle::ready(ExportOutcome::Failure(FailureReason::AlreadyShutdown));
        };

        let items = batch.len() as u64;
        inner.stats.seen.fetch_add(items, Ordering::Relaxed);

        let payload = match T::marshal(batch) {
            Ok(payload) => payload,
            Err(err) => {
                otlp_error!(
                    name: "GrpcExporter.ExportFailed",
                    message = format!("Failed to export {}s. Unable to encode the batch: {err}", signal.type_name),
                    signal = signal.type_name,
                );
                inner.stats.failed.fetch_add(items, Ordering::Relaxed);
                return CompletionHandle::ready(ExportOutcome::Failure(FailureReason::Encoding));
            }
        };

        let deadline = inner.deadline.deadline(call_timeout);
        let mut shutdown = inner.lifecycle.shutdown_signal();
        let (handle, completer) = CompletionHandle::pending();

        otlp_debug!(
            name: "GrpcExporter.ExportStarted",
            signal = signal.type_name,
            items = items,
            payload_bytes = payload.len() as u64,
            timeout_in_millisecs = deadline.timeout().as_millis() as u64,
        );

        let task_inner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    otlp_debug!(name: "GrpcExporter.ExportCancelled", signal = signal.type_name);
                    task_inner.stats.failed.fetch_add(items, Ordering::Relaxed);
                    ExportOutcome::Failure(FailureReason::AlreadyShutdown)
                }
                result = transport.send(signal, payload, deadline) => task_inner.finish(result, items),
            };

            // The outcome must be visible before shutdown can observe the
            // slot as free.
            completer.complete(outcome);
            drop(guard);
        });

        handle
    }

    /// Begin shutting down.
    ///
    /// Exports issued afterwards fail without a network call and in-flight
    /// exports resolve as failures. The handle resolves once every in-flight
    /// export has resolved and the channel is released. Calling it again is
    /// a no-op that succeeds.
    pub fn shutdown(&self) -> CompletionHandle {
        let inner = &self.inner;
        let signal = inner.signal;

        if !inner.lifecycle.begin_shutdown() {
            otlp_debug!(name: "GrpcExporter.ShutdownCalledAgain", signal = signal.type_name);
            return CompletionHandle::ready(ExportOutcome::Success);
        }
        otlp_debug!(name: "GrpcExporter.ShuttingDown", signal = signal.type_name);

        // In-flight calls hold their own clone until they are cancelled.
        drop(inner.take_transport());

        let (handle, completer) = CompletionHandle::pending();
        let task_inner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            task_inner.lifecycle.wait_idle().await;
            task_inner.lifecycle.finish_shutdown();
            otlp_debug!(name: "GrpcExporter.Shutdown", signal = signal.type_name);
            completer.complete(ExportOutcome::Success);
        });

        handle
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ExporterState {
        self.inner.lifecycle.state()
    }

    /// Item counters since the exporter was built.
    pub fn stats(&self) -> ExportStats {
        self.inner.stats.snapshot()
    }

    /// The signal row this exporter sends with.
    pub fn signal(&self) -> &'static Signal {
        self.inner.signal
    }

    /// The exporter-wide timeout of each call.
    pub fn timeout(&self) -> Duration {
        self.inner.deadline.timeout()
    }

    pub(crate) fn from_parts(
        signal: &'static Signal,
        transport: GrpcTransport,
        deadline: DeadlinePolicy,
        runtime: Handle,
    ) -> Self {
        GrpcExporter {
            inner: Arc::new(ExporterInner {
                signal,
                transport: Mutex::new(Some(transport)),
                deadline,
                lifecycle: Arc::new(Lifecycle::new()),
                runtime,
                stats: Counters::default(),
            }),
            _record: PhantomData,
        }
    }
}

impl ExporterInner {
    fn transport(&self) -> Option<GrpcTransport> {
        match self.transport.lock() {
            Ok(transport) => transport.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn take_transport(&self) -> Option<GrpcTransport> {
        match self.transport.lock() {
            Ok(mut transport) => transport.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn finish(&self, result: Result<Bytes, TransportError>, items: u64) -> ExportOutcome {
        let signal = self.signal;

        let status = match result {
            Ok(response) => {
                if let Some(partial) = signal
                    .partial_success(&response)
                    .filter(PartialSuccess::is_reported)
                {
                    otlp_warn!(
                        name: "GrpcExporter.PartialSuccess",
                        message = format!(
                            "Partial success exporting {}s: {} rejected. {}",
                            signal.type_name, partial.rejected, partial.error_message
                        ),
                        signal = signal.type_name,
                        rejected = partial.rejected,
                    );
                }
                self.stats.exported.fetch_add(items, Ordering::Relaxed);
                otlp_debug!(name: "GrpcExporter.ExportSucceeded", signal = signal.type_name, items = items);
                return ExportOutcome::Success;
            }
            Err(error) => error.status(),
        };

        match classify(signal.type_name, &status) {
            Classification::Success => {
                self.stats.exported.fetch_add(items, Ordering::Relaxed);
                ExportOutcome::Success
            }
            Classification::Failure {
                reason,
                level,
                message,
            } => {
                match level {
                    DiagnosticLevel::Warn => {
                        otlp_warn!(
                            name: "GrpcExporter.ExportFailed",
                            message = message,
                            signal = signal.type_name,
                            grpc_status = status.code_value(),
                        );
                    }
                    DiagnosticLevel::Error => {
                        otlp_error!(
                            name: "GrpcExporter.ExportFailed",
                            message = message,
                            signal = signal.type_name,
                            grpc_status = status.code_value(),
                        );
                    }
                }
                self.stats.failed.fetch_add(items, Ordering::Relaxed);
                ExportOutcome::Failure(reason)
            }
        }
    }
}

impl Drop for ExporterInner {
    fn drop(&mut self) {
        if self.lifecycle.state() == ExporterState::Active {
            otlp_debug!(name: "GrpcExporter.DroppedWithoutShutdown", signal = self.signal.type_name);
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    seen: AtomicU64,
    exported: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ExportStats {
        ExportStats {
            seen: self.seen.load(Ordering::Relaxed),
            exported: self.exported.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Item counts of an exporter, updated once per export call.
///
/// Calls refused because the exporter was shut down are not counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Items handed to `export`.
    pub seen: u64,
    /// Items the collector accepted.
    pub exported: u64,
    /// Items in calls that failed.
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT;

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(
            DeadlinePolicy::default().timeout(),
            OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT
        );
    }

    #[test]
    fn stats_snapshot_reads_counters() {
        let stats = Counters::default();
        stats.seen.fetch_add(10, Ordering::Relaxed);
        stats.exported.fetch_add(7, Ordering::Relaxed);
        stats.failed.fetch_add(3, Ordering::Relaxed);

        assert_eq!(
            stats.snapshot(),
            ExportStats {
                seen: 10,
                exported: 7,
                failed: 3,
            }
        );
    }
}
