use axum::{
    extract::{OriginalUri, Path, State},
    Json,
};

use crate::error::{ApiError};
use crate::schemas::ActivationResponse;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/status/{unique_ref}",
    params(("unique_ref" = String, Path, description = "Client idempotency key")),
    responses(
        (status = 200, description = "Current transaction state", body = ActivationResponse),
        (status = 404, description = "Unknown unique_ref", body = crate::error::ErrorResponse)
    ),
    tag = "Status"
)]
pub async fn get_status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(unique_ref): Path<String>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let tx = state
        .orchestrator
        .get_status(&unique_ref)
        .await
        .map_err(|e| e.at(uri.path()))?;

    Ok(Json(ActivationResponse::from(&tx)))
}
