//! Route definitions for the `/bookshelf` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bookshelf;
use crate::state::AppState;

/// Routes mounted at `/bookshelf`.
///
/// ```text
/// POST   /process             -> process_shelf
/// GET    /results/{job_id}    -> get_results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/process", post(bookshelf::process_shelf))
        .route("/results/{job_id}", get(bookshelf::get_results))
}
