use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

mod azure;
mod memory;

pub use azure::{AzureTableStore, TableStorageConfig, TABLE_API_VERSION};
pub use memory::InMemoryTableStore;

/// Partition holding one metadata row per artwork image.
pub const ARTWORK_PARTITION: &str = "Artwork";

/// The `Id` column. Rows written by different tools store it either as a
/// number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtworkId {
    Number(i64),
    Text(String),
}

impl ArtworkId {
    /// Exact match against a caller supplied identifier.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            ArtworkId::Number(n) => id.parse::<i64>().is_ok_and(|parsed| parsed == *n),
            ArtworkId::Text(text) => text == id,
        }
    }
}

impl fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtworkId::Number(n) => write!(f, "{n}"),
            ArtworkId::Text(text) => write!(f, "{text}"),
        }
    }
}

/// A metadata row. The row key is the name of the blob it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TableRow")]
pub struct ArtworkMetadata {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(rename = "Id")]
    pub id: Option<ArtworkId>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<i64>,
    #[serde(rename = "Quantity")]
    pub quantity: Option<i64>,
}

/// Wire shape of a row. Quantity may be stored under `Quantity`, under the
/// misspelled `Quantitiy`, or under both; `Quantity` wins.
#[derive(Deserialize)]
struct TableRow {
    #[serde(rename = "PartitionKey")]
    partition_key: String,
    #[serde(rename = "RowKey")]
    row_key: String,
    #[serde(rename = "Id", default)]
    id: Option<ArtworkId>,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Year", default, deserialize_with = "lenient_int")]
    year: Option<i64>,
    #[serde(rename = "Quantity", default, deserialize_with = "lenient_int")]
    quantity: Option<i64>,
    #[serde(rename = "Quantitiy", default, deserialize_with = "lenient_int")]
    quantitiy: Option<i64>,
}

impl From<TableRow> for ArtworkMetadata {
    fn from(row: TableRow) -> Self {
        Self {
            partition_key: row.partition_key,
            row_key: row.row_key,
            id: row.id,
            title: row.title,
            description: row.description,
            year: row.year,
            quantity: row.quantity.or(row.quantitiy),
        }
    }
}

impl ArtworkMetadata {
    pub fn new(row_key: &str) -> Self {
        Self {
            partition_key: ARTWORK_PARTITION.to_string(),
            row_key: row_key.to_string(),
            id: None,
            title: None,
            description: None,
            year: None,
            quantity: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

// Edm.Int64 values arrive as JSON strings.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<IntRepr>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(IntRepr::Int(n)) => Ok(Some(n)),
        Some(IntRepr::Float(f)) if f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(IntRepr::Float(f)) => Err(serde::de::Error::custom(format!(
            "expected an integer, got {f}"
        ))),
        Some(IntRepr::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(IntRepr::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {text:?}"))),
    }
}

/// OData filter selecting rows whose `Id` equals `id`. Numeric ids are
/// compared as numbers, anything else as a quoted string literal.
pub fn id_filter(id: &str) -> String {
    match id.trim().parse::<i64>() {
        Ok(n) => format!("Id eq {n}"),
        Err(_) => format!("Id eq '{}'", escape_literal(id)),
    }
}

/// Doubles single quotes for use inside an OData string literal or key.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Read access to artwork metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Point lookup. A missing row is `Ok(None)`.
    async fn get_entity(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<ArtworkMetadata>>;

    /// Rows whose `Id` equals `id`, at most `limit`, in store order.
    async fn find_by_id(&self, id: &str, limit: usize) -> Result<Vec<ArtworkMetadata>>;
}
