use axum::{
    extract::{rejection::JsonRejection, OriginalUri, State},
    Extension, Json,
};

use crate::context::RequestContext;
use crate::error::{ApiError, AppError};
use crate::schemas::{VoidRequest, VoidResponse};
use crate::validation::validate_void;
use crate::AppState;

/// Reverses an activation. A vendor decline is a 200 with `response_code = "02"`.
#[utoipa::path(
    post,
    path = "/voids",
    request_body = VoidRequest,
    responses(
        (status = 200, description = "Vendor answered; see response_code", body = VoidResponse),
        (status = 400, description = "Invalid request or transaction not activated", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown unique_ref", body = crate::error::ErrorResponse),
        (status = 422, description = "Invoice or product does not match", body = crate::error::ErrorResponse),
        (status = 504, description = "Vendor timed out", body = crate::error::ErrorResponse)
    ),
    tag = "Voids"
)]
pub async fn process_void(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<VoidRequest>, JsonRejection>,
) -> Result<Json<VoidResponse>, ApiError> {
    let path = uri.path();
    let Json(request) =
        payload.map_err(|e| AppError::MalformedRequest(e.body_text()).at(path))?;
    validate_void(&request).map_err(|e| AppError::from(e).at(path))?;

    state
        .orchestrator
        .process_void(&ctx, request)
        .await
        .map(Json)
        .map_err(|e| e.at(path))
}
