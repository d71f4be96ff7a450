use axum::{
    extract::{Path, State},
    Json,
};
use tracing::error;

use super::RouteState;
use crate::http_objects::{ApiError, Asset, AssetList};

/// List every asset in the assets container
#[utoipa::path(
    get,
    path = "/assets",
    tag = "artwork",
    responses(
        (status = 200, description = "All assets with their direct urls", body = AssetList),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to list assets")
    ),
)]
pub async fn list_assets(State(state): State<RouteState>) -> Result<Json<AssetList>, ApiError> {
    let blobs = state.assets.list().await.map_err(|e| {
        error!("error listing assets: {:?}", e);
        ApiError::internal_error("Failed to fetch assets.")
    })?;
    Ok(Json(AssetList {
        results: blobs.into_iter().map(Asset::from).collect(),
    }))
}

/// Get a single asset by name
#[utoipa::path(
    get,
    path = "/assets/{name}",
    tag = "artwork",
    params(("name" = String, Path, description = "Blob name of the asset")),
    responses(
        (status = 200, description = "The asset and its direct url", body = Asset),
        (status = NOT_FOUND, description = "No asset with that name"),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to check the asset")
    ),
)]
pub async fn get_asset(
    Path(name): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<Asset>, ApiError> {
    let exists = state.assets.exists(&name).await.map_err(|e| {
        error!(asset = %name, "error fetching asset: {:?}", e);
        ApiError::internal_error("Failed to fetch asset.")
    })?;
    if !exists {
        return Err(ApiError::not_found(&format!("Asset \"{name}\" not found.")));
    }
    Ok(Json(Asset {
        url: state.assets.url(&name),
        name,
    }))
}
