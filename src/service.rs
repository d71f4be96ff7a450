use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStorage;
use table_store::{AzureTableStore, MetadataStore};
use tokio::signal;
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    routes::{create_routes, RouteState},
};

#[derive(Clone)]
pub struct Service {
    pub config: ServerConfig,
    pub route_state: RouteState,
}

impl Service {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let assets = Arc::new(
            BlobStorage::new(config.storage.assets_blob_config()?)
                .context("error initializing assets BlobStorage")?,
        );
        let artworks = Arc::new(
            BlobStorage::new(config.storage.artwork_blob_config()?)
                .context("error initializing artworks BlobStorage")?,
        );
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            AzureTableStore::new(config.storage.table_config()?)
                .context("error initializing metadata table store")?,
        );
        Ok(Self::with_stores(config, assets, artworks, metadata))
    }

    pub fn with_stores(
        config: ServerConfig,
        assets: Arc<BlobStorage>,
        artworks: Arc<BlobStorage>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        if config.function_key.is_none() {
            warn!("no function key configured, artwork routes are open to anonymous callers");
        }
        let route_state = RouteState {
            assets,
            artworks,
            metadata,
            sas_ttl: config.sas_ttl(),
            function_key: config.function_key.clone(),
            route_prefix: config.route_prefix.clone(),
        };
        Self {
            config,
            route_state,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(self.route_state.clone());
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    handle.shutdown();
}
