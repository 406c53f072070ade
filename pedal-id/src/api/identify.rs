//! One-shot identification
//!
//! POST /api/identify takes an image data URI and returns the result, its
//! aggregate and the rendered view in one response. No session state is
//! touched.

use axum::{extract::State, routing::post, Json, Router};
use pedal_common::{aggregate, AggregateReport, DataUri, IdentificationResult};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::view::ResultView;
use crate::AppState;

/// Request body carrying an image
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRequest {
    pub photo_data_uri: String,
}

/// POST /api/identify response
#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub result: IdentificationResult,
    pub report: AggregateReport,
    pub view: ResultView,
}

impl IdentifyResponse {
    pub fn new(result: IdentificationResult) -> Self {
        let report = aggregate(&result);
        let view = ResultView::build(&result, &report);
        Self {
            result,
            report,
            view,
        }
    }
}

/// Validate an incoming photo data URI against the accepted types and size limit
pub fn decode_photo(raw: &str, max_bytes: usize) -> ApiResult<DataUri> {
    let image = DataUri::parse(raw)?;
    if !image.is_accepted_image() {
        return Err(ApiError::BadRequest(format!(
            "Unsupported image type: {}",
            image.mime_type()
        )));
    }
    image.ensure_within(max_bytes)?;
    Ok(image)
}

/// POST /api/identify
pub async fn identify(
    State(state): State<AppState>,
    Json(request): Json<PhotoRequest>,
) -> ApiResult<Json<IdentifyResponse>> {
    let image = decode_photo(&request.photo_data_uri, state.config.max_image_bytes)?;

    tracing::info!(
        identifier = state.identifier.name(),
        mime_type = %image.mime_type(),
        bytes = image.decoded_len(),
        "Identifying pedals"
    );

    match state.identifier.identify(&image).await {
        Ok(result) => {
            tracing::info!(pedals = result.identified_count(), "Identification complete");
            Ok(Json(IdentifyResponse::new(result)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Identification failed");
            state.record_error(e.to_string()).await;
            Err(ApiError::Upstream(e.to_string()))
        }
    }
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new().route("/api/identify", post(identify))
}
