use std::{fmt::Debug, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use artwork_utils::{encode_path, SharedKeySigner};
use chrono::Utc;
use futures::StreamExt;
use object_store::{azure::MicrosoftAzureBuilder, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

mod sas;

pub use sas::{BlobSas, SasPermissions, SasProtocol, SignedUrl, SAS_VERSION};

/// Lifetime of every signed URL handed out by the service.
pub const DEFAULT_SAS_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    pub account_name: String,
    pub account_key: String,
    pub container: String,
    /// Overrides `https://{account}.blob.core.windows.net`, e.g. for Azurite.
    pub endpoint: Option<String>,
}

impl BlobStorageConfig {
    pub fn service_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account_name),
        }
    }

    pub fn container_url(&self) -> String {
        format!("{}/{}", self.service_url(), self.container)
    }
}

/// A stored object and its direct, unsigned address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub name: String,
    pub url: String,
}

/// Read-only view of a single container.
#[derive(Clone)]
pub struct BlobStorage {
    object_store: Arc<dyn ObjectStore>,
    container: String,
    container_url: String,
    signer: SharedKeySigner,
}

impl Debug for BlobStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStorage")
            .field("container", &self.container)
            .field("container_url", &self.container_url)
            .finish()
    }
}

impl BlobStorage {
    pub fn new(config: BlobStorageConfig) -> Result<Self> {
        if config.container.is_empty() {
            return Err(anyhow!("blob container name is empty"));
        }
        let signer = SharedKeySigner::new(&config.account_name, &config.account_key)?;
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(&config.account_name)
            .with_access_key(&config.account_key)
            .with_container_name(&config.container);
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let object_store = builder
            .build()
            .with_context(|| format!("failed to create object store for {}", config.container))?;
        info!(
            container = %config.container,
            url = %config.container_url(),
            "using blob container"
        );
        Ok(Self {
            object_store: Arc::new(object_store),
            container_url: config.container_url(),
            container: config.container,
            signer,
        })
    }

    /// Wraps an already constructed object store, e.g.
    /// `object_store::memory::InMemory`.
    pub fn with_object_store(
        object_store: Arc<dyn ObjectStore>,
        container: &str,
        container_url: &str,
        signer: SharedKeySigner,
    ) -> Self {
        Self {
            object_store,
            container: container.to_string(),
            container_url: container_url.trim_end_matches('/').to_string(),
            signer,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn container_url(&self) -> &str {
        &self.container_url
    }

    /// Direct address of `name`: `<containerBaseUrl>/<name>`.
    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url, encode_path(name))
    }

    /// Enumerates every object in the container.
    pub async fn list(&self) -> Result<Vec<BlobRef>> {
        let mut stream = self.object_store.list(None);
        let mut blobs = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta =
                meta.with_context(|| format!("error listing container {}", self.container))?;
            let name = meta.location.to_string();
            blobs.push(BlobRef {
                url: self.url(&name),
                name,
            });
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(container = %self.container, count = blobs.len(), "listed blobs");
        Ok(blobs)
    }

    /// Single existence check; a missing object is `Ok(false)`.
    ///
    /// `name` is matched verbatim against the names `list` reports. A name
    /// that is not a valid object path can't exist in the container.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let Ok(location) = Path::parse(name) else {
            debug!(container = %self.container, name, "not a valid blob path");
            return Ok(false);
        };
        match self.object_store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(anyhow!(
                "can't check blob {:?} in {}: {:?}",
                name,
                self.container,
                e
            )),
        }
    }

    /// Issues a read-only SAS URL for `name`, valid over HTTP or HTTPS,
    /// expiring `ttl` from now.
    pub fn signed_url(&self, name: &str, ttl: Duration) -> Result<SignedUrl> {
        if ttl.is_zero() {
            return Err(anyhow!("signed url ttl must be positive"));
        }
        let ttl = chrono::Duration::from_std(ttl).context("signed url ttl out of range")?;
        let expires_on = Utc::now() + ttl;
        let sas = BlobSas {
            container: &self.container,
            blob_name: name,
            permissions: SasPermissions::Read,
            protocol: SasProtocol::HttpsAndHttp,
            expires_on,
        };
        let query = sas.to_query(&self.signer)?;
        Ok(SignedUrl {
            url: format!("{}?{}", self.url(name), query),
            expires_on,
        })
    }
}
