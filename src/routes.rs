use std::{sync::Arc, time::Duration};

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware,
    routing::get,
    Json,
    Router,
};
use blob_store::BlobStorage;
use table_store::MetadataStore;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    http_objects::{ApiError, Artwork, ArtworkEntry, ArtworkList, Asset, AssetList},
    middleware::require_function_key,
};

mod artworks;
mod assets;

use artworks::{get_artwork_by_id, list_artworks, missing_artwork_id};
use assets::{get_asset, list_assets};

#[derive(OpenApi)]
#[openapi(
        paths(
            assets::list_assets,
            assets::get_asset,
            artworks::list_artworks,
            artworks::get_artwork_by_id,
        ),
        components(
            schemas(
                ApiError,
                Asset,
                AssetList,
                ArtworkEntry,
                ArtworkList,
                Artwork,
            )
        ),
        tags(
            (name = "artwork", description = "Artwork catalog API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub assets: Arc<BlobStorage>,
    pub artworks: Arc<BlobStorage>,
    pub metadata: Arc<dyn MetadataStore>,
    pub sas_ttl: Duration,
    pub function_key: Option<String>,
    pub route_prefix: String,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/assets", get(list_assets))
        .route("/assets/{name}", get(get_asset));

    let protected = Router::new()
        .route("/getArtImages", get(list_artworks))
        .route("/art", get(missing_artwork_id))
        .route("/art/", get(missing_artwork_id))
        .route("/art/{id}", get(get_artwork_by_id))
        .route_layer(middleware::from_fn_with_state(
            route_state.clone(),
            require_function_key,
        ));

    let functions = public.merge(protected).with_state(route_state.clone());
    let router = if route_state.route_prefix.is_empty() {
        functions
    } else {
        Router::new().nest(&route_state.route_prefix, functions)
    };

    router
        .route("/", get(index))
        .route(
            "/docs/openapi.json",
            get(openapi_json).with_state(route_state.clone()),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
}

async fn index() -> &'static str {
    "Artwork Server"
}

async fn openapi_json(State(state): State<RouteState>) -> Json<utoipa::openapi::OpenApi> {
    let mut doc = ApiDoc::openapi();
    if !state.route_prefix.is_empty() {
        doc.servers = Some(vec![utoipa::openapi::server::Server::new(
            state.route_prefix.clone(),
        )]);
    }
    Json(doc)
}
