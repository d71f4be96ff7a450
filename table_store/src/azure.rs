use anyhow::{anyhow, Context, Result};
use artwork_utils::{encode_path, encode_query_value, rfc1123_now, SharedKeySigner};
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{escape_literal, id_filter, ArtworkMetadata, MetadataStore};

pub const TABLE_API_VERSION: &str = "2019-02-02";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";
const NEXT_PARTITION_KEY_HEADER: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY_HEADER: &str = "x-ms-continuation-nextrowkey";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStorageConfig {
    pub account_name: String,
    pub account_key: String,
    pub table_name: String,
    /// Overrides `https://{account}.table.core.windows.net`.
    pub endpoint: Option<String>,
}

impl TableStorageConfig {
    pub fn service_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.table.core.windows.net", self.account_name),
        }
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    value: Vec<ArtworkMetadata>,
}

/// Where the next page of a query starts. A page may be partial, or empty,
/// and still carry a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Continuation {
    next_partition_key: String,
    next_row_key: Option<String>,
}

impl Continuation {
    fn from_headers(headers: &header::HeaderMap) -> Option<Self> {
        let header_value = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            next_partition_key: header_value(NEXT_PARTITION_KEY_HEADER)?,
            next_row_key: header_value(NEXT_ROW_KEY_HEADER),
        })
    }
}

/// Table service client using SharedKeyLite authorization.
#[derive(Debug, Clone)]
pub struct AzureTableStore {
    client: reqwest::Client,
    service_url: String,
    table: String,
    signer: SharedKeySigner,
}

impl AzureTableStore {
    pub fn new(config: TableStorageConfig) -> Result<Self> {
        if config.table_name.is_empty() {
            return Err(anyhow!("table name is empty"));
        }
        let signer = SharedKeySigner::new(&config.account_name, &config.account_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            service_url: config.service_url(),
            table: config.table_name,
            signer,
        })
    }

    pub(crate) fn entity_url(&self, partition_key: &str, row_key: &str) -> Result<Url> {
        let url = format!(
            "{}/{}(PartitionKey='{}',RowKey='{}')",
            self.service_url,
            self.table,
            encode_path(&escape_literal(partition_key)),
            encode_path(&escape_literal(row_key)),
        );
        Url::parse(&url).with_context(|| format!("invalid entity url {url}"))
    }

    pub(crate) fn query_url(
        &self,
        filter: &str,
        limit: usize,
        continuation: Option<&Continuation>,
    ) -> Result<Url> {
        let mut url = format!(
            "{}/{}()?$filter={}&$top={}",
            self.service_url,
            self.table,
            encode_query_value(filter),
            limit
        );
        if let Some(continuation) = continuation {
            url.push_str("&NextPartitionKey=");
            url.push_str(&encode_query_value(&continuation.next_partition_key));
            if let Some(next_row_key) = &continuation.next_row_key {
                url.push_str("&NextRowKey=");
                url.push_str(&encode_query_value(next_row_key));
            }
        }
        Url::parse(&url).with_context(|| format!("invalid query url {url}"))
    }

    /// `SharedKeyLite` header value. The canonicalized resource is the
    /// account name followed by the encoded request path; query parameters
    /// are not signed.
    pub(crate) fn authorization(&self, url: &Url, date: &str) -> Result<String> {
        let canonicalized_resource = format!("/{}{}", self.signer.account(), url.path());
        let signature = self
            .signer
            .sign(&format!("{date}\n{canonicalized_resource}"))?;
        Ok(format!(
            "SharedKeyLite {}:{}",
            self.signer.account(),
            signature
        ))
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response> {
        let date = rfc1123_now();
        let authorization = self.authorization(&url, &date)?;
        debug!(url = %url, "table request");
        self.client
            .get(url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", TABLE_API_VERSION)
            .header("DataServiceVersion", "3.0;NetFx")
            .header(header::ACCEPT, ACCEPT_NO_METADATA)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await
            .with_context(|| format!("table request to {url} failed"))
    }
}

async fn table_error(context: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow!("table {}: HTTP {} - {}", context, status, body)
}

#[async_trait]
impl MetadataStore for AzureTableStore {
    async fn get_entity(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<ArtworkMetadata>> {
        let url = self.entity_url(partition_key, row_key)?;
        let response = self.send(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(table_error("get entity", response).await);
        }
        let entity = response
            .json::<ArtworkMetadata>()
            .await
            .with_context(|| format!("malformed entity {partition_key}/{row_key}"))?;
        Ok(Some(entity))
    }

    async fn find_by_id(&self, id: &str, limit: usize) -> Result<Vec<ArtworkMetadata>> {
        let filter = id_filter(id);
        let mut rows = Vec::new();
        let mut continuation = None;
        while rows.len() < limit {
            let remaining = limit - rows.len();
            let url = self.query_url(&filter, remaining, continuation.as_ref())?;
            let response = self.send(url).await?;
            if !response.status().is_success() {
                return Err(table_error("query entities", response).await);
            }
            let next = Continuation::from_headers(response.headers());
            let body = response
                .json::<QueryResponse>()
                .await
                .with_context(|| format!("malformed query response for id {id}"))?;
            rows.extend(body.value.into_iter().take(remaining));
            match next {
                Some(next) => {
                    debug!(id, found = rows.len(), "following query continuation");
                    continuation = Some(next);
                }
                None => break,
            }
        }
        Ok(rows)
    }
}
