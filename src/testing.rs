use std::{fmt, sync::Arc};

use anyhow::{anyhow, Result};
use artwork_utils::SharedKeySigner;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use blob_store::BlobStorage;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use http_body_util::BodyExt;
use object_store::{
    memory::InMemory,
    path::Path,
    GetOptions,
    GetResult,
    ListResult,
    MultipartUpload,
    ObjectMeta,
    ObjectStore,
    PutMultipartOpts,
    PutOptions,
    PutPayload,
    PutResult,
};
use table_store::{ArtworkMetadata, InMemoryTableStore, MetadataStore};
use tower::ServiceExt;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{
    config::{ServerConfig, StorageConfig},
    routes::create_routes,
    service::Service,
};

pub const TEST_ACCOUNT: &str = "gallery";
pub const TEST_KEY: &str = "a2V5LWZvci10ZXN0aW5nLW9ubHk=";
pub const ASSETS_URL: &str = "https://gallery.blob.core.windows.net/assets";
pub const ARTWORKS_URL: &str = "https://gallery.blob.core.windows.net/artworks";
pub const TEST_FUNCTION_KEY: &str = "test-function-key";

/// Object store whose every call fails, standing in for an unreachable or
/// misconfigured storage account.
#[derive(Debug, Default)]
pub struct FailingObjectStore;

impl fmt::Display for FailingObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailingObjectStore")
    }
}

fn unavailable() -> object_store::Error {
    object_store::Error::Generic {
        store: "FailingObjectStore",
        source: "storage account unreachable".into(),
    }
}

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put_opts(
        &self,
        _location: &Path,
        _payload: PutPayload,
        _opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        Err(unavailable())
    }

    async fn put_multipart_opts(
        &self,
        _location: &Path,
        _opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        Err(unavailable())
    }

    async fn get_opts(
        &self,
        _location: &Path,
        _options: GetOptions,
    ) -> object_store::Result<GetResult> {
        Err(unavailable())
    }

    async fn delete(&self, _location: &Path) -> object_store::Result<()> {
        Err(unavailable())
    }

    fn list(&self, _prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        Box::pin(stream::once(async { Err(unavailable()) }))
    }

    async fn list_with_delimiter(&self, _prefix: Option<&Path>) -> object_store::Result<ListResult> {
        Err(unavailable())
    }

    async fn copy(&self, _from: &Path, _to: &Path) -> object_store::Result<()> {
        Err(unavailable())
    }

    async fn copy_if_not_exists(&self, _from: &Path, _to: &Path) -> object_store::Result<()> {
        Err(unavailable())
    }
}

/// Metadata store that errors on every call.
#[derive(Debug, Default)]
pub struct FailingMetadataStore;

#[async_trait]
impl MetadataStore for FailingMetadataStore {
    async fn get_entity(
        &self,
        _partition_key: &str,
        _row_key: &str,
    ) -> Result<Option<ArtworkMetadata>> {
        Err(anyhow!("table service unavailable"))
    }

    async fn find_by_id(&self, _id: &str, _limit: usize) -> Result<Vec<ArtworkMetadata>> {
        Err(anyhow!("table service unavailable"))
    }
}

pub fn test_config(function_key: Option<&str>) -> ServerConfig {
    ServerConfig {
        function_key: function_key.map(str::to_string),
        storage: StorageConfig {
            account_name: Some(TEST_ACCOUNT.to_string()),
            account_key: Some(TEST_KEY.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn storage(store: Arc<dyn ObjectStore>, container: &str, url: &str) -> Result<Arc<BlobStorage>> {
    Ok(Arc::new(BlobStorage::with_object_store(
        store,
        container,
        url,
        SharedKeySigner::new(TEST_ACCOUNT, TEST_KEY)?,
    )))
}

pub struct TestService {
    pub service: Service,
    pub assets: Arc<InMemory>,
    pub artworks: Arc<InMemory>,
    pub metadata: Arc<InMemoryTableStore>,
}

impl TestService {
    pub fn new() -> Result<Self> {
        Self::with_config(test_config(None))
    }

    pub fn with_config(config: ServerConfig) -> Result<Self> {
        init_test_tracing();
        let assets = Arc::new(InMemory::new());
        let artworks = Arc::new(InMemory::new());
        let metadata = Arc::new(InMemoryTableStore::new());
        let service = Service::with_stores(
            config,
            storage(assets.clone(), "assets", ASSETS_URL)?,
            storage(artworks.clone(), "artworks", ARTWORKS_URL)?,
            metadata.clone(),
        );
        Ok(Self {
            service,
            assets,
            artworks,
            metadata,
        })
    }

    /// Replaces both blob containers with stores that always fail.
    pub fn with_failing_blobs(mut self) -> Result<Self> {
        let failing: Arc<dyn ObjectStore> = Arc::new(FailingObjectStore);
        self.service.route_state.assets = storage(failing.clone(), "assets", ASSETS_URL)?;
        self.service.route_state.artworks = storage(failing, "artworks", ARTWORKS_URL)?;
        Ok(self)
    }

    pub fn with_failing_metadata(mut self) -> Self {
        self.service.route_state.metadata = Arc::new(FailingMetadataStore);
        self
    }

    pub async fn put_asset(&self, name: &str) -> Result<()> {
        self.assets
            .put(&Path::parse(name)?, PutPayload::from(Bytes::from_static(b"asset")))
            .await?;
        Ok(())
    }

    pub async fn put_artwork(&self, name: &str) -> Result<()> {
        self.artworks
            .put(&Path::parse(name)?, PutPayload::from(Bytes::from_static(b"artwork")))
            .await?;
        Ok(())
    }

    pub async fn insert_metadata(&self, metadata: ArtworkMetadata) {
        self.metadata.insert(metadata).await;
    }

    pub fn router(&self) -> Router {
        create_routes(self.service.route_state.clone())
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, Bytes)> {
        self.get_with_headers(uri, &[]).await
    }

    pub async fn get_with_headers(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> Result<(StatusCode, Bytes)> {
        let mut request = Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = self
            .router()
            .oneshot(request.body(Body::empty())?)
            .await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        Ok((status, body))
    }

    pub async fn get_json(&self, uri: &str) -> Result<(StatusCode, serde_json::Value)> {
        let (status, body) = self.get(uri).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }
}

fn init_test_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer().with_filter(env_filter)),
    );
}
