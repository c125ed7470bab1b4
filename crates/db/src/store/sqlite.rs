use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::debug;

use super::{CollectionPath, Document, DocumentStore, StoreError, generate_document_id};
use crate::DBService;

/// Document store persisted in the local SQLite `documents` table.
///
/// Each row holds one JSON document; `update` performs the top-level merge
/// inside a transaction so a concurrent writer cannot interleave between the
/// read and the write of the same row.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(db: &DBService) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }
}

fn parse_row(id: String, data: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(Document { id, data: map }),
        other => Err(StoreError::NotAnObject(other.to_string())),
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1")
                .bind(collection.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, data)| parse_row(id, &data))
            .collect()
    }

    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(data,)| parse_row(id.to_string(), &data))
            .transpose()
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = generate_document_id();
        let json = serde_json::to_string(&data)?;
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(json)
            .execute(&self.pool)
            .await?;
        debug!(collection = %collection, id = %id, "Created document");
        Ok(id)
    }

    async fn set(
        &self,
        collection: &CollectionPath,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(&data)?;
        sqlx::query(
            r#"INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
               ON CONFLICT(collection, id) DO UPDATE SET
                   data = excluded.data,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((data,)) = row else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };

        let mut document = parse_row(id.to_string(), &data)?;
        document.data.extend(fields);
        let json = serde_json::to_string(&document.data)?;

        sqlx::query(
            r#"UPDATE documents
               SET data = $3, updated_at = datetime('now', 'subsec')
               WHERE collection = $1 AND id = $2"#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        debug!(
            collection = %collection,
            id,
            rows_affected = result.rows_affected(),
            "Deleted document"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::to_fields;

    async fn store() -> SqliteDocumentStore {
        let db = DBService::new_in_memory().await.unwrap();
        SqliteDocumentStore::new(&db)
    }

    #[tokio::test]
    async fn create_get_list_roundtrip() {
        let store = store().await;
        let routes = CollectionPath::business("biz_1", "routes");
        let id = store
            .create(&routes, to_fields(&json!({"name": "NY", "stores": []})).unwrap())
            .await
            .unwrap();

        let doc = store.get(&routes, &id).await.unwrap().unwrap();
        assert_eq!(doc.data["name"], json!("NY"));
        assert_eq!(store.list(&routes).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = store().await;
        let routes = CollectionPath::business("biz_1", "routes");
        let err = store.update(&routes, "ghost", Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn set_replaces_and_delete_is_idempotent() {
        let store = store().await;
        let users = CollectionPath::new("users");
        store
            .set(&users, "u1", to_fields(&json!({"email": "a@b.c", "role": "x"})).unwrap())
            .await
            .unwrap();
        store
            .set(&users, "u1", to_fields(&json!({"email": "d@e.f"})).unwrap())
            .await
            .unwrap();

        let doc = store.get(&users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.data.get("role"), None);
        assert_eq!(doc.data["email"], json!("d@e.f"));

        store.delete(&users, "u1").await.unwrap();
        store.delete(&users, "u1").await.unwrap();
        assert!(store.get(&users, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_backed_database_persists_between_pools() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("docs.db").display());
        let alerts = CollectionPath::business("biz_1", "saleAlerts");

        let id = {
            let db = DBService::new(&url).await.unwrap();
            SqliteDocumentStore::new(&db)
                .create(&alerts, to_fields(&json!({"storeName": "Costco"})).unwrap())
                .await
                .unwrap()
        };

        let db = DBService::new(&url).await.unwrap();
        let doc = SqliteDocumentStore::new(&db)
            .get(&alerts, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["storeName"], json!("Costco"));
    }
}
