//! Hierarchical document store abstraction.
//!
//! Documents live in collections addressed by slash-separated paths such as
//! `businesses/{businessId}/products`. Each document is a JSON object keyed by
//! an opaque string id that the store generates on `create`.

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use serde_json::{Map, Value};
use thiserror::Error;

/// Length of ids generated by [`DocumentStore::create`].
pub const GENERATED_ID_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("document {0} is not a JSON object")]
    NotAnObject(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Path of a collection, e.g. `businesses/biz_42/routes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// `businesses/{business_id}/{name}`
    pub fn business(business_id: &str, name: &str) -> Self {
        Self(format!("businesses/{business_id}/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored document: its id plus the field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    /// Field map with the document id attached under `id`.
    pub fn into_value(self) -> Value {
        let mut data = self.data;
        data.insert("id".to_string(), Value::String(self.id));
        Value::Object(data)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in the collection, in no guaranteed order.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Writes a new document under a store-generated id and returns the id.
    async fn create(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> Result<String, StoreError>;

    /// Creates or fully replaces the document with the given id.
    async fn set(
        &self,
        collection: &CollectionPath,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Merges top-level `fields` into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Removes the document. Deleting a missing id is not an error.
    async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), StoreError>;
}

/// Generates a 20 character alphanumeric document id.
pub fn generate_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(char::from)
        .collect()
}

/// Converts a serialized payload into a field map.
pub fn to_fields<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::NotAnObject(other.to_string())),
    }
}
