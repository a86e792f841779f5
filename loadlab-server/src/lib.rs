use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::StreamExt;
use loadlab_common::{
    AsyncResponse, CpuResponse, DocsResponse, Endpoint, ErrorCheckResponse, ErrorResponse,
    HealthResponse, JsonEchoResponse, LargeResponse, MemoryResponse, SlowResponse,
};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

pub mod config;
pub mod interceptor;
pub mod memory;
pub mod report;
pub mod simulators;
pub mod stats;

use config::STREAM_INTERVAL;
use interceptor::{count_request, internal_error, panic_response};
use memory::MemoryProbe;
use simulators::WorkloadError;
use stats::StatsAggregator;

/// Abstraction over current time for testability.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Abstraction over randomness so tests can pin the random branches.
pub trait RandomSource: Send + Sync {
    /// Uniform draw from `[0, 1)`.
    fn unit(&self) -> f64;

    /// Uniform draw from the inclusive range `[low, high]`.
    fn between(&self, low: u64, high: u64) -> u64;
}

/// Production randomness backed by the thread-local generator.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn between(&self, low: u64, high: u64) -> u64 {
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Reproducible randomness from a fixed seed.
pub struct SeededRandom(Mutex<StdRng>);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl RandomSource for SeededRandom {
    fn unit(&self) -> f64 {
        self.0.lock().gen::<f64>()
    }

    fn between(&self, low: u64, high: u64) -> u64 {
        self.0.lock().gen_range(low..=high)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<StatsAggregator>,
    pub clock: Arc<dyn Clock>,
    pub rng: Arc<dyn RandomSource>,
    pub memory: Arc<MemoryProbe>,
}

impl AppState {
    /// Fresh state whose start time is the clock's current reading.
    pub fn new(clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            stats: Arc::new(StatsAggregator::new(clock.now())),
            clock,
            rng,
            memory: Arc::new(MemoryProbe::new()),
        }
    }

    /// Fractional seconds since the state was created.
    pub fn uptime_secs(&self) -> f64 {
        report::elapsed_secs(self.stats.start_time(), self.clock.now())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

/// LoadLab Server
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        let routes = Router::new()
            .route("/", get(handle_docs))
            .route("/health", get(handle_health))
            .route("/cpu", get(handle_cpu))
            .route("/slow", get(handle_slow))
            .route("/memory", get(handle_memory))
            .route("/json", post(handle_json))
            .route("/error", get(handle_error))
            .route("/stats", get(handle_stats))
            .route("/large", get(handle_large))
            .route("/async", get(handle_async))
            .route("/stream", get(handle_stream));
        Self::with_middleware(routes, state)
    }

    /// Wrap `routes` with the 404 fallback, panic recovery, request counting and tracing.
    ///
    /// Layer order, outermost first: trace, count, catch-panic, handler. Counting therefore
    /// happens before any handler runs, including the one for `/stats`.
    pub fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
        let stats = state.stats.clone();
        routes
            .fallback(handle_not_found)
            .layer(CatchPanicLayer::custom(move |err: Box<dyn Any + Send + 'static>| {
                panic_response(&stats, err)
            }))
            .layer(middleware::from_fn_with_state(state.clone(), count_request))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let state = AppState::new(Arc::new(SystemClock), Arc::new(ThreadRandom));
        let app = Self::create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "LoadLab server listening");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    } else {
        std::future::pending::<()>().await;
    }
}

/// Build the `{error, message}` envelope used by every non-streaming failure.
pub fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse { error: error.into(), message: message.into() })).into_response()
}

/// Count a simulator failure and answer with its envelope.
fn workload_failure(state: &AppState, err: WorkloadError) -> Response {
    state.stats.record_error();
    tracing::debug!(error = %err, "Workload reported a failure");
    error_response(err.status(), err.title(), err.to_string())
}

fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Handler for GET /health
pub async fn handle_health(State(state): State<AppState>) -> Response {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: iso_timestamp(state.clock.now()),
        uptime: state.uptime_secs(),
    })
    .into_response()
}

/// Handler for GET /cpu: runs the Fibonacci workload on the request's worker thread.
pub async fn handle_cpu() -> Response {
    let outcome = simulators::compute_bound();
    Json(CpuResponse {
        result: outcome.result,
        duration_ms: outcome.duration.as_millis() as u64,
        message: "CPU intensive task completed".to_string(),
    })
    .into_response()
}

/// Handler for GET /slow
pub async fn handle_slow(State(state): State<AppState>) -> Response {
    let delay_ms = simulators::delay_bound(state.rng.as_ref()).await;
    Json(SlowResponse { message: "Slow response completed".to_string(), delay_ms }).into_response()
}

/// Handler for GET /memory: the allocation is held until the body is built.
pub async fn handle_memory(State(state): State<AppState>) -> Response {
    let hold = match simulators::memory_bound() {
        Ok(hold) => hold,
        Err(err) => return workload_failure(&state, err),
    };

    let sample = state.memory.sample();
    let body = MemoryResponse {
        message: "Memory allocated".to_string(),
        allocated_mb: hold.allocated_mb(),
        memory_usage: sample.usage(),
    };
    drop(hold);
    Json(body).into_response()
}

/// Handler for POST /json: counts top-level keys (or array elements) and echoes the body.
///
/// A body that cannot be read as a JSON object or array is an unhandled fault: a counted 500.
pub async fn handle_json(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return internal_error(&state.stats, rejection.body_text()),
    };

    let received_keys = match &body {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => return internal_error(&state.stats, "Expected a JSON object or array"),
    };

    Json(JsonEchoResponse {
        message: "JSON processed successfully".to_string(),
        received_keys,
        echo: body,
    })
    .into_response()
}

/// Handler for GET /error: fails 30% of the time.
pub async fn handle_error(State(state): State<AppState>) -> Response {
    match simulators::inject_error(state.rng.as_ref()) {
        Ok(()) => Json(ErrorCheckResponse {
            message: "Request succeeded".to_string(),
            status: "ok".to_string(),
        })
        .into_response(),
        Err(err) => workload_failure(&state, err),
    }
}

/// Handler for GET /stats. The snapshot already includes this request.
pub async fn handle_stats(State(state): State<AppState>) -> Response {
    let snapshot = state.stats.snapshot();
    let memory = state.memory.sample();
    Json(report::build(&snapshot, state.clock.now(), &memory)).into_response()
}

/// Handler for GET /large
pub async fn handle_large() -> Response {
    let data = simulators::large_payload();
    Json(LargeResponse {
        message: "Large response".to_string(),
        size_bytes: data.len(),
        size_mb: simulators::size_mb_label(data.len()),
        data,
    })
    .into_response()
}

/// Handler for GET /async
pub async fn handle_async(State(state): State<AppState>) -> Response {
    match simulators::concurrent_subtasks(state.rng.as_ref()).await {
        Ok(results) => Json(AsyncResponse {
            message: "Async operations completed".to_string(),
            results,
        })
        .into_response(),
        Err(err) => workload_failure(&state, err),
    }
}

/// Handler for GET /stream: plain-text chunks written as they are produced.
pub async fn handle_stream(State(state): State<AppState>) -> Response {
    let chunks = simulators::chunk_stream(state.clock.clone(), STREAM_INTERVAL)
        .map(|chunk| Ok::<_, Infallible>(chunk.to_string()));

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(chunks),
    )
        .into_response()
}

/// Static API documentation for GET /
pub fn api_docs() -> DocsResponse {
    let endpoints: BTreeMap<String, String> = Endpoint::ALL
        .into_iter()
        .filter(|e| *e != Endpoint::Docs)
        .map(|e| (e.label(), e.description().to_string()))
        .collect();

    let mut usage = BTreeMap::new();
    usage.insert("example_curl".to_string(), "curl http://localhost:8080/health".to_string());
    usage.insert(
        "loadtest".to_string(),
        "loadlab-loadgen --target http://localhost:8080 --concurrency 10 --requests 100".to_string(),
    );

    DocsResponse {
        message: "LoadLab Load Test Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
        usage,
    }
}

/// Handler for GET /
pub async fn handle_docs() -> Response {
    Json(api_docs()).into_response()
}

/// Fallback for unknown routes; still counted by the interceptor.
pub async fn handle_not_found(uri: axum::http::Uri) -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found", format!("No route for {}", uri.path()))
}
