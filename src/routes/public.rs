use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::public::{CatalogResponse, PreferenceResponse},
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Read-only endpoints exposing the catalog and player selections.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/catalog", get(get_catalog))
        .route("/preferences/{player_id}", get(get_preference))
}

#[utoipa::path(
    get,
    path = "/catalog",
    tag = "public",
    responses((status = 200, description = "Catalog currently served", body = CatalogResponse))
)]
/// Return the reward catalog currently in effect.
pub async fn get_catalog(State(state): State<SharedState>) -> Json<CatalogResponse> {
    Json(public_service::get_catalog(&state))
}

#[utoipa::path(
    get,
    path = "/preferences/{player_id}",
    tag = "public",
    params(("player_id" = u64, Path, description = "64-bit player id")),
    responses(
        (status = 200, description = "Player selection", body = PreferenceResponse),
        (status = 400, description = "Invalid player id"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Return a player's reward selection, loading it from storage if needed.
pub async fn get_preference(
    State(state): State<SharedState>,
    Path(player_id): Path<u64>,
) -> Result<Json<PreferenceResponse>, AppError> {
    let payload = public_service::get_preference(&state, player_id).await?;
    Ok(Json(payload))
}
