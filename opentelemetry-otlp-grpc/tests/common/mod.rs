#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opentelemetry::trace::{SpanId, SpanKind, TraceId};
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_otlp_grpc::{LogRecord, Marshal, MetricPoint, SignalKind, SpanRecord};
use opentelemetry_proto::tonic::collector::logs::v1::{
    logs_service_server::{LogsService, LogsServiceServer},
    ExportLogsPartialSuccess, ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsPartialSuccess, ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTracePartialSuccess, ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_sdk::Resource;
use prost::Message;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Code, Request, Response, Status};
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// One request as the collector saw it.
#[derive(Clone, Debug)]
pub struct Received {
    pub kind: SignalKind,
    pub payload: Vec<u8>,
    pub tenant: Option<String>,
}

#[derive(Debug, Default)]
struct CollectorState {
    received: Vec<Received>,
    error: Option<(Code, String)>,
    delay: Option<Duration>,
    partial_success: Option<(i64, String)>,
}

/// A collector serving all three OTLP services on a local port.
///
/// Every test starts its own; nothing is shared between tests.
#[derive(Clone, Debug)]
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<Mutex<CollectorState>>,
    _stop: Arc<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct Service {
    state: Arc<Mutex<CollectorState>>,
}

impl MockCollector {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(CollectorState::default()));
        let service = Service {
            state: Arc::clone(&state),
        };
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(TraceServiceServer::new(service.clone()))
                .add_service(MetricsServiceServer::new(service.clone()))
                .add_service(LogsServiceServer::new(service))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = stop_rx.await;
                })
                .await
                .expect("collector failed")
        });

        MockCollector {
            addr,
            state,
            _stop: Arc::new(stop_tx),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer every following call with `code` and `message`.
    pub fn fail_with(&self, code: i32, message: Option<&str>) {
        self.state.lock().unwrap().error =
            Some((Code::from_i32(code), message.unwrap_or_default().to_owned()));
    }

    /// Hold every following call for `delay` before answering.
    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn partial_success(&self, rejected: i64, message: &str) {
        self.state.lock().unwrap().partial_success = Some((rejected, message.to_owned()));
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.lock().unwrap().received.clone()
    }

    /// Resource groups of every `T` request received so far, in arrival order.
    pub fn resource_groups<T: Marshal>(&self) -> Vec<T::ResourceGroup> {
        self.received()
            .iter()
            .filter(|received| received.kind == T::SIGNAL.kind)
            .flat_map(|received| T::unmarshal(&received.payload).expect("undecodable request"))
            .collect()
    }
}

impl Service {
    // Telemetry is recorded even when the call is then failed.
    async fn handle<M: Message>(
        &self,
        kind: SignalKind,
        request: Request<M>,
    ) -> Result<Option<(i64, String)>, Status> {
        let tenant = request
            .metadata()
            .get("x-tenant")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let (delay, error, partial_success) = {
            let mut state = self.state.lock().unwrap();
            state.received.push(Received {
                kind,
                payload: request.get_ref().encode_to_vec(),
                tenant,
            });
            (
                state.delay,
                state.error.clone(),
                state.partial_success.clone(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some((code, message)) => Err(Status::new(code, message)),
            None => Ok(partial_success),
        }
    }
}

#[tonic::async_trait]
impl TraceService for Service {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let partial_success = self.handle(SignalKind::Traces, request).await?;
        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: partial_success.map(|(rejected, error_message)| {
                ExportTracePartialSuccess {
                    rejected_spans: rejected,
                    error_message,
                }
            }),
        }))
    }
}

#[tonic::async_trait]
impl MetricsService for Service {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let partial_success = self.handle(SignalKind::Metrics, request).await?;
        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: partial_success.map(|(rejected, error_message)| {
                ExportMetricsPartialSuccess {
                    rejected_data_points: rejected,
                    error_message,
                }
            }),
        }))
    }
}

#[tonic::async_trait]
impl LogsService for Service {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let partial_success = self.handle(SignalKind::Logs, request).await?;
        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: partial_success.map(|(rejected, error_message)| {
                ExportLogsPartialSuccess {
                    rejected_log_records: rejected,
                    error_message,
                }
            }),
        }))
    }
}

/// A log event emitted by the exporter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedLog {
    pub level: Level,
    pub name: String,
    pub message: String,
}

/// Collects the exporter's events for the current thread.
#[derive(Clone, Debug, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
    /// Install a capture as the thread's default subscriber until the guard
    /// is dropped. Tests using it run on a current-thread runtime so that
    /// spawned exports emit on the same thread.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedLog> {
        self.events.lock().unwrap().clone()
    }

    /// Events at WARN or above.
    pub fn diagnostics(&self) -> Vec<CapturedLog> {
        self.events()
            .into_iter()
            .filter(|event| event.level <= Level::WARN)
            .collect()
    }

    /// Assert exactly one diagnostic was logged and return it.
    pub fn single_diagnostic(&self) -> CapturedLog {
        let diagnostics = self.diagnostics();
        assert_eq!(
            diagnostics.len(),
            1,
            "expected exactly one diagnostic, got {diagnostics:?}"
        );
        diagnostics.into_iter().next().unwrap()
    }
}

#[derive(Default)]
struct EventVisitor {
    name: String,
    message: String,
}

impl tracing::field::Visit for EventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "name" => self.name = value.to_owned(),
            "message" => self.message = value.to_owned(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "name" => self.name = format!("{value:?}").trim_matches('"').to_owned(),
            "message" => self.message = format!("{value:?}"),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != "opentelemetry-otlp-grpc" {
            return;
        }
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedLog {
            level: *event.metadata().level(),
            name: visitor.name,
            message: visitor.message,
        });
    }
}

pub fn resource() -> Resource {
    Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", "checkout"),
            KeyValue::new("service.instance.id", "checkout-1"),
        ])
        .build()
}

pub fn scope() -> InstrumentationScope {
    InstrumentationScope::builder("io.example.checkout")
        .with_version("1.4.0")
        .build()
}

fn at(i: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000 + i)
}

pub fn fake_span(i: u64) -> SpanRecord {
    let mut span = SpanRecord::new(
        resource(),
        scope(),
        TraceId::from_bytes((0xabcd_0000 + i as u128).to_be_bytes()),
        SpanId::from_bytes((i + 1).to_be_bytes()),
        format!("charge-card-{i}"),
        at(i),
    );
    span.kind = SpanKind::Server;
    span.end_time = at(i + 1);
    span.attributes = vec![KeyValue::new("http.request.method", "POST")];
    span
}

pub fn fake_metric(i: u64) -> MetricPoint {
    let mut point = MetricPoint::gauge(resource(), scope(), "queue.depth", i as i64, at(i));
    point.attributes = vec![KeyValue::new("queue", format!("q{i}"))];
    point
}

pub fn fake_log(i: u64) -> LogRecord {
    let mut record = LogRecord::new(resource(), scope(), format!("payment {i} accepted"), at(i));
    record.attributes = vec![KeyValue::new("payment.id", i as i64)];
    record
}
