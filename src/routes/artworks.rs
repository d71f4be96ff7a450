use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, State},
    Json,
};
use table_store::{ArtworkMetadata, MetadataStore, ARTWORK_PARTITION};
use tracing::{error, warn};

use super::RouteState;
use crate::http_objects::{ApiError, Artwork, ArtworkEntry, ArtworkList};

/// Enough rows to tell a unique id from a duplicated one.
const ID_PROBE_LIMIT: usize = 2;

/// Outcome of the per-blob metadata lookup while building the catalog.
#[derive(Debug)]
pub enum MetadataLookup {
    Found(ArtworkMetadata),
    NotFound,
    Unavailable(anyhow::Error),
}

impl From<Result<Option<ArtworkMetadata>>> for MetadataLookup {
    fn from(result: Result<Option<ArtworkMetadata>>) -> Self {
        match result {
            Ok(Some(metadata)) => MetadataLookup::Found(metadata),
            Ok(None) => MetadataLookup::NotFound,
            Err(e) => MetadataLookup::Unavailable(e),
        }
    }
}

impl MetadataLookup {
    pub async fn fetch(store: &dyn MetadataStore, blob_name: &str) -> Self {
        store.get_entity(ARTWORK_PARTITION, blob_name).await.into()
    }

    /// Absent and unreachable metadata both degrade to `None`.
    pub fn into_metadata(self, blob_name: &str) -> Option<ArtworkMetadata> {
        match self {
            MetadataLookup::Found(metadata) => Some(metadata),
            MetadataLookup::NotFound => {
                warn!(blob = %blob_name, "metadata not found");
                None
            }
            MetadataLookup::Unavailable(e) => {
                warn!(blob = %blob_name, "metadata lookup failed: {:?}", e);
                None
            }
        }
    }
}

/// List the artwork catalog with signed image urls
#[utoipa::path(
    get,
    path = "/getArtImages",
    tag = "artwork",
    responses(
        (status = 200, description = "Every artwork blob joined with its metadata", body = ArtworkList),
        (status = UNAUTHORIZED, description = "Missing or wrong function key"),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to list artworks")
    ),
)]
pub async fn list_artworks(
    State(state): State<RouteState>,
) -> Result<Json<ArtworkList>, ApiError> {
    build_catalog(&state).await.map(Json).map_err(|e| {
        error!("error listing blobs: {:?}", e);
        ApiError::internal_error("Failed to fetch images.")
    })
}

async fn build_catalog(state: &RouteState) -> Result<ArtworkList> {
    let blobs = state.artworks.list().await?;
    let mut artworks = Vec::with_capacity(blobs.len());
    for blob in blobs {
        let metadata = MetadataLookup::fetch(state.metadata.as_ref(), &blob.name)
            .await
            .into_metadata(&blob.name);
        let signed = state.artworks.signed_url(&blob.name, state.sas_ttl)?;
        artworks.push(ArtworkEntry::new(signed.url, metadata));
    }
    Ok(ArtworkList { artworks })
}

/// Get one artwork by its metadata id
#[utoipa::path(
    get,
    path = "/art/{id}",
    tag = "artwork",
    params(("id" = String, Path, description = "Value of the metadata Id column")),
    responses(
        (status = 200, description = "The artwork with a signed image url", body = Artwork),
        (status = BAD_REQUEST, description = "No id given"),
        (status = UNAUTHORIZED, description = "Missing or wrong function key"),
        (status = NOT_FOUND, description = "No metadata with that id"),
        (status = INTERNAL_SERVER_ERROR, description = "Lookup failed")
    ),
)]
pub async fn get_artwork_by_id(
    Path(id): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<Artwork>, ApiError> {
    if id.trim().is_empty() {
        return Err(missing_id());
    }
    match resolve_artwork(&state, &id).await {
        Ok(Some(artwork)) => Ok(Json(artwork)),
        Ok(None) => Err(ApiError::not_found(&format!(
            "No metadata found for artwork ID {id}"
        ))),
        Err(e) => {
            error!(id = %id, "failed to get artwork by id {}: {:?}", id, e);
            Err(ApiError::internal_error("Internal server error"))
        }
    }
}

pub async fn missing_artwork_id() -> ApiError {
    missing_id()
}

fn missing_id() -> ApiError {
    ApiError::bad_request("Missing id query parameter")
}

async fn resolve_artwork(state: &RouteState, id: &str) -> Result<Option<Artwork>> {
    let mut matches = state.metadata.find_by_id(id, ID_PROBE_LIMIT).await?;
    if matches.len() > 1 {
        let rows: Vec<&str> = matches.iter().map(|m| m.row_key.as_str()).collect();
        return Err(anyhow!("artwork id {} is not unique: rows {:?}", id, rows));
    }
    let Some(metadata) = matches.pop() else {
        return Ok(None);
    };

    let blob_name = metadata.row_key.clone();
    if !state.artworks.exists(&blob_name).await? {
        return Err(anyhow!(
            "blob {:?} referenced by artwork id {} does not exist",
            blob_name,
            id
        ));
    }
    let signed = state.artworks.signed_url(&blob_name, state.sas_ttl)?;
    Ok(Some(Artwork::new(signed.url, metadata)))
}
