mod common;

use std::time::Duration;

use common::{fake_log, fake_span, LogCapture, MockCollector};
use futures_util::future::join_all;
use opentelemetry_otlp_grpc::{
    ExportOutcome, ExporterState, FailureReason, LogExporter, SpanExporter,
};

const WAIT: Duration = Duration::from_secs(10);

async fn wait_for_requests(collector: &MockCollector, count: usize) {
    tokio::time::timeout(WAIT, async {
        while collector.received().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("collector never saw the request");
}

#[tokio::test]
async fn in_flight_export_fails_when_shutdown_begins() {
    let (logs, _guard) = LogCapture::install();
    let collector = MockCollector::start().await;
    collector.delay(Duration::from_secs(30));
    let exporter = SpanExporter::new(collector.endpoint()).unwrap();

    let export = exporter.export(&[fake_span(0)]);
    wait_for_requests(&collector, 1).await;

    let shutdown = exporter.shutdown();
    assert_eq!(exporter.state(), ExporterState::ShuttingDown);

    assert_eq!(
        export.join(WAIT).await,
        ExportOutcome::Failure(FailureReason::AlreadyShutdown)
    );
    assert!(shutdown.join(WAIT).await.is_success());
    assert_eq!(exporter.state(), ExporterState::Shutdown);
    assert_eq!(exporter.stats().failed, 1);

    // Refused and cancelled calls are not diagnostics.
    assert!(logs.diagnostics().is_empty(), "{:?}", logs.diagnostics());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_resolves_after_raced_exports() {
    let collector = MockCollector::start().await;
    collector.delay(Duration::from_secs(30));
    let exporter = LogExporter::new(collector.endpoint()).unwrap();

    let mut exports: Vec<_> = (0..4).map(|i| exporter.export(&[fake_log(i)])).collect();
    wait_for_requests(&collector, 4).await;

    assert!(exporter.shutdown().join(WAIT).await.is_success());

    for export in &mut exports {
        assert_eq!(
            export.try_outcome(),
            Some(ExportOutcome::Failure(FailureReason::AlreadyShutdown))
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_network_call_after_shutdown() {
    let collector = MockCollector::start().await;
    let exporter = SpanExporter::new(collector.endpoint()).unwrap();
    assert!(exporter.export(&[fake_span(0)]).join(WAIT).await.is_success());

    assert!(exporter.shutdown().join(WAIT).await.is_success());
    for i in 0..5 {
        let outcome = exporter.export(&[fake_span(i)]).join(WAIT).await;
        assert_eq!(outcome.failure_reason(), Some(FailureReason::AlreadyShutdown));
    }

    assert_eq!(collector.received().len(), 1);
    assert_eq!(exporter.stats().seen, 1);
}

#[tokio::test]
async fn shutdown_again_while_shutting_down_succeeds_immediately() {
    let collector = MockCollector::start().await;
    collector.delay(Duration::from_secs(30));
    let exporter = SpanExporter::new(collector.endpoint()).unwrap();

    let export = exporter.export(&[fake_span(0)]);
    wait_for_requests(&collector, 1).await;

    let first = exporter.shutdown();
    let mut second = exporter.shutdown();
    assert_eq!(second.try_outcome(), Some(ExportOutcome::Success));

    assert!(!export.join(WAIT).await.is_success());
    assert!(first.join(WAIT).await.is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clones_share_lifecycle() {
    let collector = MockCollector::start().await;
    let exporter = LogExporter::new(collector.endpoint()).unwrap();
    let clone = exporter.clone();

    assert!(clone.shutdown().join(WAIT).await.is_success());

    assert_eq!(exporter.state(), ExporterState::Shutdown);
    assert!(!exporter.export(&[fake_log(0)]).join(WAIT).await.is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exports_resolve_independently() {
    let collector = MockCollector::start().await;
    let exporter = SpanExporter::new(collector.endpoint()).unwrap();

    let outcomes = join_all((0..8).map(|i| exporter.export(&[fake_span(i)]))).await;

    assert!(outcomes.iter().all(ExportOutcome::is_success));
    assert_eq!(collector.received().len(), 8);
    assert_eq!(exporter.stats().exported, 8);
}

#[test]
fn build_outside_runtime_fails() {
    let result = SpanExporter::new("http://localhost:4317");
    assert!(matches!(
        result,
        Err(opentelemetry_otlp_grpc::ExporterBuildError::NoAsyncRuntime)
    ));
}
