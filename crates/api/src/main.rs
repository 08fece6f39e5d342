use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfscan_api::config::ServerConfig;
use shelfscan_api::{background, routes, state::AppState};
use shelfscan_events::EventBus;
use shelfscan_ledger::{JobLedger, MemoryLedger};
use shelfscan_ocr::{FixedRecognizer, HttpRecognizer, Recognizer};
use shelfscan_pipeline::{Dispatcher, StatusResolver};
use shelfscan_queue::{MemoryQueue, WorkQueue};
use shelfscan_store::{FsStore, MemoryStore, ObjectStore};
use shelfscan_worker::{WorkerContext, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfscan=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Object store ---
    let store: Arc<dyn ObjectStore> = match &config.storage_dir {
        Some(dir) => {
            tracing::info!(dir = %dir, "Using filesystem object store");
            Arc::new(FsStore::new(dir.clone()))
        }
        None => {
            tracing::warn!("STORAGE_DIR not set; using in-memory object store");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Recognizer ---
    let recognizer: Arc<dyn Recognizer> = match &config.ocr_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Using HTTP recognition service");
            Arc::new(HttpRecognizer::new(endpoint.clone()))
        }
        None => {
            tracing::warn!("OCR_ENDPOINT not set; using fixed empty-shelf recognizer");
            Arc::new(FixedRecognizer::empty_shelf())
        }
    };

    // --- Ledger, queue, event bus ---
    let ledger: Arc<dyn JobLedger> = Arc::new(MemoryLedger::new());
    let queue: Arc<dyn WorkQueue> = Arc::new(MemoryQueue::new(config.queue.clone()));
    let event_bus = Arc::new(EventBus::default());

    // --- Background event log ---
    let event_log_cancel = tokio_util::sync::CancellationToken::new();
    let event_log_handle = tokio::spawn(background::event_log::run(
        event_bus.subscribe(),
        event_log_cancel.clone(),
    ));

    // --- Worker pool ---
    let pool = WorkerPool::start(WorkerContext {
        ledger: Arc::clone(&ledger),
        queue: Arc::clone(&queue),
        store: Arc::clone(&store),
        recognizer,
        events: Arc::clone(&event_bus),
        config: config.worker.clone(),
    });

    // --- Pipeline services ---
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&ledger),
        Arc::clone(&queue),
        Arc::clone(&store),
        Arc::clone(&event_bus),
        config.allowed_content_types.clone(),
    ));
    let status = Arc::new(StatusResolver::new(Arc::clone(&ledger)));

    // --- App state ---
    let state = AppState {
        dispatcher,
        status,
        config: Arc::new(config.clone()),
    };

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Upload size cap (multipart bodies).
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Drain the worker pool first (it may have in-flight jobs).
    pool.shutdown().await;

    // Stop the event log once nothing can publish anymore.
    event_log_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), event_log_handle).await;
    tracing::info!("Event log stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
