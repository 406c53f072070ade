//! Capture/identify session endpoints
//!
//! Each page load creates a session with `POST /api/session` and drives it
//! through `/api/session/:id/...`. Every response is the session snapshot plus
//! the camera directives of the transition just taken. The browser stops its
//! tracks whenever `release_camera` is set, stops only the stream it just
//! opened when `drop_surplus_camera` is set, and calls getUserMedia whenever
//! `request_camera` is set.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use pedal_common::aggregate;
use pedal_common::session::{
    CaptureSession, Completion, InputMode, SessionSnapshot, StateTransition,
};
use pedal_common::DataUri;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identify::{decode_photo, PhotoRequest};
use crate::error::{ApiError, ApiResult, IDENTIFY_FAILED_MESSAGE};
use crate::view::ResultView;
use crate::AppState;

/// Session endpoint response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub release_camera: bool,
    pub request_camera: bool,
    pub drop_surplus_camera: bool,
    /// Rendered view of the current result, if any
    pub view: Option<ResultView>,
    /// Toast-style message for the last action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// Set when an identification finished after the session moved on
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl SessionResponse {
    fn from_session(session: &CaptureSession, transition: Option<&StateTransition>) -> Self {
        let snapshot = session.snapshot();
        let view = snapshot
            .result
            .as_ref()
            .map(|result| ResultView::build(result, &aggregate(result)));

        Self {
            snapshot,
            release_camera: transition.is_some_and(|t| t.release_camera),
            request_camera: transition.is_some_and(|t| t.request_camera),
            drop_surplus_camera: transition.is_some_and(|t| t.drop_surplus_camera),
            view,
            notice: None,
            stale: false,
        }
    }

    fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

/// POST /api/session/:id/mode request
#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: InputMode,
}

/// POST /api/session/:id/permission request
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/session/:id/capture-failed request
#[derive(Debug, Deserialize)]
pub struct CaptureFailedRequest {
    pub reason: String,
}

/// POST /api/session
///
/// Start a fresh session for a page load.
pub async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let snapshot = state.sessions.create().await;
    tracing::info!(session_id = %snapshot.session_id, "Capture session started");
    Json(SessionResponse {
        snapshot,
        release_camera: false,
        request_camera: false,
        drop_surplus_camera: false,
        view: None,
        notice: None,
        stale: false,
    })
}

/// GET /api/session/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .update(id, |session| Ok(SessionResponse::from_session(session, None)))
        .await
        .map(Json)
}

/// POST /api/session/:id/mode
pub async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ModeRequest>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .update(id, |session| {
            let t = session.switch_mode(request.mode);
            Ok(SessionResponse::from_session(session, Some(&t)))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/camera
///
/// Ask for a camera stream (retry after a denial, or after page load).
pub async fn start_camera(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .update(id, |session| {
            let t = session.request_camera()?;
            Ok(SessionResponse::from_session(session, Some(&t)))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/permission
pub async fn report_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PermissionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .update(id, |session| {
            if request.granted {
                let t = session.permission_granted();
                return Ok(SessionResponse::from_session(session, Some(&t)));
            }

            let t = session.permission_denied(request.reason.as_deref().unwrap_or_default());
            let notice = session.last_error().map(str::to_string);
            let response = SessionResponse::from_session(session, Some(&t));
            Ok(match notice {
                Some(notice) => response.with_notice(notice),
                None => response,
            })
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/capture
pub async fn capture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PhotoRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let image = decode_photo(&request.photo_data_uri, state.config.max_image_bytes)?;

    state
        .sessions
        .update(id, |session| {
            let t = session.capture(image)?;
            Ok(SessionResponse::from_session(session, Some(&t))
                .with_notice("Image captured. Click 'Identify Pedals' to continue."))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/capture-failed
pub async fn capture_failed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CaptureFailedRequest>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .update(id, |session| {
            let t = session.capture_failed(&request.reason);
            let notice = session.last_error().unwrap_or_default().to_string();
            Ok(SessionResponse::from_session(session, Some(&t)).with_notice(notice))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/upload
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PhotoRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let image = decode_photo(&request.photo_data_uri, state.config.max_image_bytes)?;

    state
        .sessions
        .update(id, |session| {
            let t = session.upload(image)?;
            Ok(SessionResponse::from_session(session, Some(&t)))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/clear
pub async fn clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .update(id, |session| {
            let t = session.clear();
            Ok(SessionResponse::from_session(session, Some(&t)))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/teardown
///
/// Releases the camera, discards the session and returns its final state.
pub async fn teardown(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    state
        .sessions
        .remove_with(id, |session| {
            let t = session.teardown();
            SessionResponse::from_session(session, Some(&t))
        })
        .await
        .map(Json)
}

/// POST /api/session/:id/identify
///
/// The session lock is not held while the vision model runs, so the page can
/// clear or switch modes meanwhile; a result for a superseded request is
/// discarded. The model call and its completion run on their own task, so
/// the session leaves `Identifying` even when the client disconnects.
pub async fn identify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let (seq, image) = state
        .sessions
        .update(id, |session| {
            let (seq, image, _) = session.begin_identify()?;
            Ok((seq, image))
        })
        .await?;

    tokio::spawn(run_identify(state, id, seq, image))
        .await
        .map_err(|e| ApiError::Internal(format!("Identification task failed: {}", e)))?
        .map(Json)
}

async fn run_identify(
    state: AppState,
    id: Uuid,
    seq: u64,
    image: DataUri,
) -> ApiResult<SessionResponse> {
    let outcome = state.identifier.identify(&image).await;
    if let Err(e) = &outcome {
        tracing::error!(session_id = %id, seq, error = %e, "Identification failed");
        state.record_error(e.to_string()).await;
    }

    let response = state
        .sessions
        .update(id, |session| {
            let (completion, notice) = match outcome {
                Ok(result) => {
                    let notice = result.completion_notice();
                    (session.complete_identify(seq, result), notice)
                }
                Err(_) => (
                    session.fail_identify(seq, IDENTIFY_FAILED_MESSAGE),
                    IDENTIFY_FAILED_MESSAGE.to_string(),
                ),
            };

            Ok(match completion {
                Completion::Applied(t) => {
                    SessionResponse::from_session(session, Some(&t)).with_notice(notice)
                }
                Completion::Stale { .. } => {
                    let mut response = SessionResponse::from_session(session, None);
                    response.stale = true;
                    response
                }
            })
        })
        .await;

    if let Err(ApiError::NotFound(_)) = &response {
        tracing::debug!(session_id = %id, seq, "Session closed before identification finished");
    }
    response
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session/:id", get(get_session))
        .route("/api/session/:id/mode", post(set_mode))
        .route("/api/session/:id/camera", post(start_camera))
        .route("/api/session/:id/permission", post(report_permission))
        .route("/api/session/:id/capture", post(capture))
        .route("/api/session/:id/capture-failed", post(capture_failed))
        .route("/api/session/:id/upload", post(upload))
        .route("/api/session/:id/clear", post(clear))
        .route("/api/session/:id/teardown", post(teardown))
        .route("/api/session/:id/identify", post(identify))
}
