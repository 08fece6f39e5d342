use std::sync::Arc;

use shelfscan_pipeline::{Dispatcher, StatusResolver};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Submission path: validate, store, record, enqueue.
    pub dispatcher: Arc<Dispatcher>,
    /// Query path: read-only ledger views.
    pub status: Arc<StatusResolver>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
