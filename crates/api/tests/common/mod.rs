#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use shelfscan_api::config::ServerConfig;
use shelfscan_api::routes;
use shelfscan_api::state::AppState;
use shelfscan_events::EventBus;
use shelfscan_ledger::{JobLedger, MemoryLedger};
use shelfscan_ocr::Recognizer;
use shelfscan_pipeline::{Dispatcher, StatusResolver};
use shelfscan_queue::{MemoryQueue, QueueConfig, WorkQueue};
use shelfscan_store::{MemoryStore, ObjectStore};
use shelfscan_worker::{WorkerConfig, WorkerContext, WorkerPool};

/// Multipart boundary used by [`multipart_image_request`].
const BOUNDARY: &str = "shelfscan-test-boundary";

/// Build a test `ServerConfig` with safe defaults and fast timings.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_upload_bytes: 10 * 1024 * 1024,
        allowed_content_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        worker: WorkerConfig {
            concurrency: 2,
            max_retries: 2,
            process_timeout: Duration::from_secs(5),
        },
        queue: QueueConfig {
            visibility_timeout: Duration::from_secs(2),
            redeliver_delay: Duration::from_millis(50),
        },
        storage_dir: None,
        ocr_endpoint: None,
    }
}

/// A fully wired application over in-memory backends, plus handles to
/// those backends for assertions.
pub struct TestApp {
    pub router: Router,
    pub ledger: Arc<MemoryLedger>,
    pub queue: Arc<MemoryQueue>,
    pub store: Arc<MemoryStore>,
    pub pool: Option<WorkerPool>,
}

/// Build the full application router with all middleware layers and a
/// running worker pool using the given recognizer.
///
/// This mirrors the wiring in `main.rs` so integration tests exercise the
/// same middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery) that production uses.
pub fn build_test_app(recognizer: Arc<dyn Recognizer>) -> TestApp {
    build(recognizer, true)
}

/// Like [`build_test_app`], but without workers: jobs stay `queued`, which
/// lets tests observe pre-processing state deterministically.
pub fn build_test_app_without_workers(recognizer: Arc<dyn Recognizer>) -> TestApp {
    build(recognizer, false)
}

fn build(recognizer: Arc<dyn Recognizer>, with_workers: bool) -> TestApp {
    let config = test_config();

    let ledger = Arc::new(MemoryLedger::new());
    let queue = Arc::new(MemoryQueue::new(config.queue.clone()));
    let store = Arc::new(MemoryStore::new());
    let event_bus = Arc::new(EventBus::default());

    let pool = with_workers.then(|| {
        WorkerPool::start(WorkerContext {
            ledger: Arc::clone(&ledger) as Arc<dyn JobLedger>,
            queue: Arc::clone(&queue) as Arc<dyn WorkQueue>,
            store: Arc::clone(&store) as Arc<dyn ObjectStore>,
            recognizer: Arc::clone(&recognizer),
            events: Arc::clone(&event_bus),
            config: config.worker.clone(),
        })
    });

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&ledger) as Arc<dyn JobLedger>,
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        Arc::clone(&event_bus),
        config.allowed_content_types.clone(),
    ));
    let status = Arc::new(StatusResolver::new(
        Arc::clone(&ledger) as Arc<dyn JobLedger>,
    ));

    let state = AppState {
        dispatcher,
        status,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        ledger,
        queue,
        store,
        pool,
    }
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Build a multipart submission request carrying one `image` field.
pub fn multipart_image_request(content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"shelf.jpg\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/v1/bookshelf/process")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
