use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{CollectionPath, Document, DocumentStore, StoreError, generate_document_id};

type Collections = BTreeMap<CollectionPath, BTreeMap<String, Map<String, Value>>>;

/// Process-local document store. Used as the test double for the remote store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub async fn count(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.clone()).or_default();
        let mut id = generate_document_id();
        while docs.contains_key(&id) {
            id = generate_document_id();
        }
        docs.insert(id.clone(), data);
        Ok(id)
    }

    async fn set(
        &self,
        collection: &CollectionPath,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.clone())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        existing.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::to_fields;

    fn products() -> CollectionPath {
        CollectionPath::business("biz_test", "products")
    }

    #[tokio::test]
    async fn update_merges_only_named_fields() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .create(
                &products(),
                to_fields(&json!({"name": "Rolls", "currentInventory": 4})).unwrap(),
            )
            .await
            .unwrap();

        store
            .update(
                &products(),
                &id,
                to_fields(&json!({"currentInventory": 9})).unwrap(),
            )
            .await
            .unwrap();

        let doc = store.get(&products(), &id).await.unwrap().unwrap();
        assert_eq!(doc.data["name"], json!("Rolls"));
        assert_eq!(doc.data["currentInventory"], json!(9));
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update(&products(), "nope", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        store.delete(&products(), "missing").await.unwrap();

        let id = store.create(&products(), Map::new()).await.unwrap();
        store.delete(&products(), &id).await.unwrap();
        store.delete(&products(), &id).await.unwrap();
        assert!(store.get(&products(), &id).await.unwrap().is_none());
        assert_eq!(store.count(&products()).await, 0);
    }

    #[tokio::test]
    async fn collections_are_isolated_per_business() {
        let store = InMemoryDocumentStore::new();
        store
            .create(&CollectionPath::business("a", "routes"), Map::new())
            .await
            .unwrap();
        let other = store
            .list(&CollectionPath::business("b", "routes"))
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
