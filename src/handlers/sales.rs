use axum::{
    extract::{rejection::JsonRejection, OriginalUri, State},
    Extension, Json,
};

use crate::context::RequestContext;
use crate::error::{ApiError, AppError};
use crate::schemas::{ActivationRequest, ActivationResponse};
use crate::validation::validate_activation;
use crate::AppState;

/// Activates a product sold at the point of sale. Replaying a `unique_ref`
/// returns the stored outcome without contacting the vendor again.
#[utoipa::path(
    post,
    path = "/sales",
    request_body = ActivationRequest,
    params(
        ("X-Correlation-Id" = Option<String>, Header, description = "Correlation id echoed on the response"),
        ("X-Retry-Count" = Option<u32>, Header, description = "Client retry attempt")
    ),
    responses(
        (status = 200, description = "Activation processed (ACTIVATED, FAILED or PENDING)", body = ActivationResponse),
        (status = 400, description = "Malformed or invalid request", body = crate::error::ErrorResponse),
        (status = 422, description = "Product, currency or amount rejected", body = crate::error::ErrorResponse),
        (status = 504, description = "Vendor timed out; the transaction is pending", body = crate::error::ErrorResponse),
        (status = 500, description = "Vendor or internal error", body = crate::error::ErrorResponse)
    ),
    tag = "Sales"
)]
pub async fn process_sale(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<ActivationRequest>, JsonRejection>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let path = uri.path();
    let Json(request) =
        payload.map_err(|e| AppError::MalformedRequest(e.body_text()).at(path))?;
    validate_activation(&request).map_err(|e| AppError::from(e).at(path))?;

    state
        .orchestrator
        .process_activation(&ctx, request)
        .await
        .map(Json)
        .map_err(|e| e.at(path))
}
