use std::{fmt::Debug, net::SocketAddr, path::Path, time::Duration};

use anyhow::{anyhow, Result};
use artwork_utils::ConnectionString;
use blob_store::{BlobStorageConfig, DEFAULT_SAS_TTL};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use table_store::TableStorageConfig;

/// Environment variables read at startup and the config keys they set.
const ENV_KEYS: &[(&str, &str)] = &[
    ("AZURE_STORAGE_ACCOUNT_NAME", "storage.account_name"),
    ("AZURE_STORAGE_ACCOUNT_KEY", "storage.account_key"),
    ("AZURE_STORAGE_CONNECTION_STRING", "storage.connection_string"),
    ("STORAGE_CONTAINER", "storage.artwork_container"),
    ("STORAGE_CONTAINER_ASSETS", "storage.assets_container"),
    ("TABLE_NAME", "storage.table_name"),
    ("LISTEN_ADDR", "listen_addr"),
    ("FUNCTION_KEY", "function_key"),
];

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub connection_string: Option<String>,
    pub blob_endpoint: Option<String>,
    pub table_endpoint: Option<String>,
    pub artwork_container: String,
    pub assets_container: String,
    pub table_name: String,
}

impl Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("table_endpoint", &self.table_endpoint)
            .field("artwork_container", &self.artwork_container)
            .field("assets_container", &self.assets_container)
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            account_name: None,
            account_key: None,
            connection_string: None,
            blob_endpoint: None,
            table_endpoint: None,
            artwork_container: "artworks".to_string(),
            assets_container: "assets".to_string(),
            table_name: "ArtworkMetadata".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountCredentials {
    account_name: String,
    account_key: String,
    blob_endpoint: Option<String>,
    table_endpoint: Option<String>,
}

impl StorageConfig {
    /// Explicit settings win over values taken from the connection string.
    fn credentials(&self) -> Result<AccountCredentials> {
        let parsed = match &self.connection_string {
            Some(cs) => ConnectionString::parse(cs)?,
            None => ConnectionString::default(),
        };
        let account_name = self
            .account_name
            .clone()
            .or_else(|| parsed.account_name.clone())
            .ok_or_else(|| anyhow!("storage account name is not configured"))?;
        let account_key = self
            .account_key
            .clone()
            .or_else(|| parsed.account_key.clone())
            .ok_or_else(|| anyhow!("storage account key is not configured"))?;
        let derived = |service: &str| {
            if self.connection_string.is_some() {
                parsed.derived_endpoint(service)
            } else {
                None
            }
        };
        let blob_endpoint = self
            .blob_endpoint
            .clone()
            .or_else(|| parsed.blob_endpoint.clone())
            .or_else(|| derived("blob"));
        let table_endpoint = self
            .table_endpoint
            .clone()
            .or_else(|| parsed.table_endpoint.clone())
            .or_else(|| derived("table"));
        Ok(AccountCredentials {
            account_name,
            account_key,
            blob_endpoint,
            table_endpoint,
        })
    }

    fn blob_config(&self, container: &str) -> Result<BlobStorageConfig> {
        let credentials = self.credentials()?;
        Ok(BlobStorageConfig {
            account_name: credentials.account_name,
            account_key: credentials.account_key,
            container: container.to_string(),
            endpoint: credentials.blob_endpoint,
        })
    }

    pub fn artwork_blob_config(&self) -> Result<BlobStorageConfig> {
        self.blob_config(&self.artwork_container)
    }

    pub fn assets_blob_config(&self) -> Result<BlobStorageConfig> {
        self.blob_config(&self.assets_container)
    }

    pub fn table_config(&self) -> Result<TableStorageConfig> {
        let credentials = self.credentials()?;
        Ok(TableStorageConfig {
            account_name: credentials.account_name,
            account_key: credentials.account_key,
            table_name: self.table_name.clone(),
            endpoint: credentials.table_endpoint,
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Prefix every function route is mounted under, e.g. `/api`.
    pub route_prefix: String,
    /// Secret required by the artwork routes. Unset leaves them open.
    pub function_key: Option<String>,
    pub structured_logging: bool,
    pub sas_ttl_secs: u64,
    pub storage: StorageConfig,
}

impl Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("route_prefix", &self.route_prefix)
            .field("function_key", &self.function_key.as_ref().map(|_| "<redacted>"))
            .field("structured_logging", &self.structured_logging)
            .field("sas_ttl_secs", &self.sas_ttl_secs)
            .field("storage", &self.storage)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:7071".to_string(),
            route_prefix: "/api".to_string(),
            function_key: None,
            structured_logging: false,
            sas_ttl_secs: DEFAULT_SAS_TTL.as_secs(),
            storage: StorageConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the optional YAML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<ServerConfig> {
        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));
        if let Some(path) = path {
            let config_str = std::fs::read_to_string(path)?;
            figment = figment.merge(Yaml::string(&config_str));
        }
        let config: ServerConfig = figment.merge(env_provider()).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<ServerConfig> {
        let config: ServerConfig = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Yaml::string(config_str))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow!("invalid listen address: {}", self.listen_addr));
        }
        if !self.route_prefix.is_empty()
            && (!self.route_prefix.starts_with('/') || self.route_prefix.ends_with('/'))
        {
            return Err(anyhow!(
                "route prefix must be empty or start with '/' and not end with '/': {}",
                self.route_prefix
            ));
        }
        if self.sas_ttl_secs == 0 {
            return Err(anyhow!("sas_ttl_secs must be greater than 0"));
        }
        if self.storage.artwork_container.is_empty() || self.storage.assets_container.is_empty() {
            return Err(anyhow!("blob container names must not be empty"));
        }
        if self.storage.table_name.is_empty() {
            return Err(anyhow!("table name must not be empty"));
        }
        self.storage.credentials()?;
        Ok(())
    }

    pub fn sas_ttl(&self) -> Duration {
        Duration::from_secs(self.sas_ttl_secs)
    }
}

fn env_provider() -> Env {
    Env::raw().filter_map(|key| {
        let name = key.as_str().to_ascii_uppercase();
        ENV_KEYS
            .iter()
            .find(|(env_name, _)| *env_name == name)
            .map(|(_, config_key)| (*config_key).into())
    })
}
