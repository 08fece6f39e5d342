pub mod bookshelf;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /bookshelf/process              submit a shelf image (multipart)
/// /bookshelf/results/{job_id}     poll job state and result
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/bookshelf", bookshelf::router())
}
