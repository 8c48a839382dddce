use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::catalog::{ComboList, LocationList},
    error::AppResult,
    response::ApiResponse,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locations", get(list_locations))
        .route("/combos", get(list_combos))
}

#[utoipa::path(
    get,
    path = "/api/locations",
    responses(
        (status = 200, description = "Active locations", body = ApiResponse<LocationList>)
    ),
    tag = "Catalog"
)]
pub async fn list_locations(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<LocationList>>> {
    let resp = catalog_service::list_locations(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/combos",
    responses(
        (status = 200, description = "Active combos by sort order", body = ApiResponse<ComboList>)
    ),
    tag = "Catalog"
)]
pub async fn list_combos(State(state): State<AppState>) -> AppResult<Json<ApiResponse<ComboList>>> {
    let resp = catalog_service::list_combos(&state).await?;
    Ok(Json(resp))
}
