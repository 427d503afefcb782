use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::product_queries;
use crate::error::ApiError;
use crate::models::product::Product;
use crate::models::render::CreateProductRequest;

/// POST /api/products — create a product record.
///
/// Deliberately minimal: just enough catalog surface that a model can be
/// uploaded and processed against a real product id. The storefront manages
/// the rest of the catalog.
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    request.validate()?;

    let product = product_queries::create_product(&state.db, &request).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "product created");

    Ok(Json(product))
}

/// GET /api/products/{product_id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = product_queries::get_product(&state.db, product_id)
        .await?
        .ok_or(ApiError::NotFound { entity: "product" })?;

    Ok(Json(product))
}
