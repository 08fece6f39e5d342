//! Handlers for the `/bookshelf` resource.
//!
//! Submission accepts a multipart upload and answers immediately with a
//! queued job; results are discovered by polling. Processing failures are
//! never surfaced here -- they land on the job record.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use shelfscan_core::{JobId, JobState};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field carrying the shelf image.
const IMAGE_FIELD: &str = "image";

/// Response payload for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub state: JobState,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /v1/bookshelf/process
///
/// Accept a bookshelf photo for asynchronous recognition. Returns 202
/// with the job id; the declared content type of the `image` field is
/// validated against the configured allowed set (415 otherwise).
pub async fn process_shelf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            IMAGE_FIELD => {
                let content_type = field
                    .content_type()
                    .map(|ct| ct.to_string())
                    .unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some((content_type, data.to_vec()));
            }
            _ => {} // ignore unknown fields
        }
    }

    let (content_type, data) = image.ok_or_else(|| {
        AppError::BadRequest(format!("Missing required '{IMAGE_FIELD}' field"))
    })?;

    let job = state.dispatcher.submit(&data, &content_type).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id,
            state: job.state,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// GET /v1/bookshelf/results/{job_id}
///
/// Poll a job's state. Returns the result once complete, the recorded
/// error once failed or dead-lettered, and 404 for job ids that were
/// never issued.
pub async fn get_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid job id '{job_id}'")))?;

    let view = state.status.status(job_id).await?;
    Ok(Json(view))
}
