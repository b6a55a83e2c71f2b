//! Image upload and session control endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use super::ApiState;
use crate::controller::SessionSnapshot;

/// Largest accepted image upload
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/session", get(session_snapshot))
        .route("/session/start", post(start_session))
        .route("/session/stop", post(stop_session))
        .with_state(state)
}

/// Session action accepted
#[derive(Serialize)]
struct SessionAccepted {
    session_id: Uuid,
}

/// Store the request body as the image for the next conversation
async fn upload_image(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::UnsupportedMedia("missing Content-Type".to_string()))?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("image body is empty".to_string()));
    }

    state
        .controller
        .upload_image(content_type, body.to_vec())
        .await?;

    Ok(Json(state.controller.snapshot().await))
}

async fn session_snapshot(State(state): State<Arc<ApiState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

async fn start_session(
    State(state): State<Arc<ApiState>>,
) -> Result<(StatusCode, Json<SessionAccepted>), ApiError> {
    let handle = state.controller.start().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SessionAccepted {
            session_id: handle.id(),
        }),
    ))
}

async fn stop_session(
    State(state): State<Arc<ApiState>>,
) -> Result<(StatusCode, Json<SessionAccepted>), ApiError> {
    let handle = state.controller.stop().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SessionAccepted {
            session_id: handle.id(),
        }),
    ))
}

/// Session API error
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    UnsupportedMedia(String),
    Conflict(String),
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::UnsupportedMedia(msg) => Self::UnsupportedMedia(msg),
            crate::Error::Precondition(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::UnsupportedMedia(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                msg,
            ),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "not_offered", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "session request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
