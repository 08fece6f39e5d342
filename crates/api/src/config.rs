use std::time::Duration;

use shelfscan_core::media::DEFAULT_ALLOWED_CONTENT_TYPES;
use shelfscan_queue::QueueConfig;
use shelfscan_worker::WorkerConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Maximum accepted upload size in bytes (default: 10 MiB).
    pub max_upload_bytes: usize,
    /// Content types the dispatcher accepts.
    pub allowed_content_types: Vec<String>,
    /// Worker pool tuning (concurrency, retries, processing timeout).
    pub worker: WorkerConfig,
    /// Queue delivery tuning (visibility timeout, redelivery delay).
    pub queue: QueueConfig,
    /// Directory for the filesystem object store; `None` selects the
    /// in-memory store.
    pub storage_dir: Option<String>,
    /// Recognition service endpoint; `None` selects the fixed
    /// empty-shelf recognizer.
    pub ocr_endpoint: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `HOST`                    | `0.0.0.0`                |
    /// | `PORT`                    | `3000`                   |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                     |
    /// | `MAX_UPLOAD_BYTES`        | `10485760`               |
    /// | `ALLOWED_CONTENT_TYPES`   | `image/jpeg,image/png`   |
    /// | `WORKER_CONCURRENCY`      | `4`                      |
    /// | `MAX_RETRIES`             | `3`                      |
    /// | `PROCESS_TIMEOUT_SECS`    | `45`                     |
    /// | `VISIBILITY_TIMEOUT_SECS` | `60`                     |
    /// | `REDELIVER_DELAY_MS`      | `1000`                   |
    /// | `STORAGE_DIR`             | unset (in-memory store)  |
    /// | `OCR_ENDPOINT`            | unset (fixed recognizer) |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs = env_parse("SHUTDOWN_TIMEOUT_SECS", 30);
        let max_upload_bytes = env_parse("MAX_UPLOAD_BYTES", 10 * 1024 * 1024);

        let allowed_content_types: Vec<String> = std::env::var("ALLOWED_CONTENT_TYPES")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_CONTENT_TYPES.join(","))
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let worker = WorkerConfig {
            concurrency: env_parse("WORKER_CONCURRENCY", 4),
            max_retries: env_parse("MAX_RETRIES", 3),
            process_timeout: Duration::from_secs(env_parse("PROCESS_TIMEOUT_SECS", 45)),
        };

        let queue = QueueConfig {
            visibility_timeout: Duration::from_secs(env_parse("VISIBILITY_TIMEOUT_SECS", 60)),
            redeliver_delay: Duration::from_millis(env_parse("REDELIVER_DELAY_MS", 1000)),
        };

        let storage_dir = std::env::var("STORAGE_DIR").ok().filter(|s| !s.is_empty());
        let ocr_endpoint = std::env::var("OCR_ENDPOINT").ok().filter(|s| !s.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            allowed_content_types,
            worker,
            queue,
            storage_dir,
            ocr_endpoint,
        }
    }
}

/// Parse an env var, falling back to a default when unset.
///
/// Panics on unparseable values, which is the desired behaviour -- we want
/// misconfiguration to fail fast at startup.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be valid: {e}")),
        Err(_) => default,
    }
}
