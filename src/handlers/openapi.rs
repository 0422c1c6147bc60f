use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Activation Gateway",
        description = "Point-of-sale product activation and void API"
    ),
    paths(
        crate::handlers::sales::process_sale,
        crate::handlers::voids::process_void,
        crate::handlers::status::get_status,
        crate::handlers::health,
    ),
    components(
        schemas(
            crate::schemas::ActivationRequest,
            crate::schemas::ActivationResponse,
            crate::schemas::VoidRequest,
            crate::schemas::VoidResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "Sales", description = "Product activation"),
        (name = "Voids", description = "Activation reversal"),
        (name = "Status", description = "Transaction lookup"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
