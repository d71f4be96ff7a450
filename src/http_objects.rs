use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blob_store::BlobRef;
use serde::{Deserialize, Serialize};
use table_store::{ArtworkId, ArtworkMetadata};
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("API Error: {} - {}", self.status_code, self.message);
        (self.status_code, self.message).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub name: String,
    pub url: String,
}

impl From<BlobRef> for Asset {
    fn from(blob: BlobRef) -> Self {
        Self {
            name: blob.name,
            url: blob.url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssetList {
    pub results: Vec<Asset>,
}

/// One catalog row: a blob joined with its metadata. Every field but `url`
/// is null when the blob has no metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArtworkEntry {
    #[schema(value_type = Option<String>)]
    pub id: Option<ArtworkId>,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<i64>,
    pub quantity: Option<i64>,
}

impl ArtworkEntry {
    pub fn new(url: String, metadata: Option<ArtworkMetadata>) -> Self {
        match metadata {
            Some(metadata) => Self {
                id: metadata.id,
                url,
                title: metadata.title,
                description: metadata.description,
                year: metadata.year,
                quantity: metadata.quantity,
            },
            None => Self {
                id: None,
                url,
                title: None,
                description: None,
                year: None,
                quantity: None,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArtworkList {
    pub artworks: Vec<ArtworkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Artwork {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<i64>,
    pub quantity: Option<i64>,
}

impl Artwork {
    pub fn new(url: String, metadata: ArtworkMetadata) -> Self {
        Self {
            url,
            title: metadata.title,
            description: metadata.description,
            year: metadata.year,
            quantity: metadata.quantity,
        }
    }
}
