use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{ArtworkMetadata, MetadataStore};

/// Metadata rows held in process, ordered by (partition, row key) like the
/// table service enumerates them.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    entities: RwLock<BTreeMap<(String, String), ArtworkMetadata>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entity: ArtworkMetadata) {
        let key = (entity.partition_key.clone(), entity.row_key.clone());
        self.entities.write().await.insert(key, entity);
    }
}

#[async_trait]
impl MetadataStore for InMemoryTableStore {
    async fn get_entity(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<ArtworkMetadata>> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned())
    }

    async fn find_by_id(&self, id: &str, limit: usize) -> Result<Vec<ArtworkMetadata>> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|entity| entity.id.as_ref().is_some_and(|e| e.matches(id)))
            .take(limit)
            .cloned()
            .collect())
    }
}
