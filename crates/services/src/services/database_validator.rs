//! Health check for the SQLite document store.

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

const REQUIRED_TABLES: &[&str] = &["documents"];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DatabaseValidationError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Checks that migrations ran and the document tables exist.
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        if !self.table_exists("_sqlx_migrations").await? {
            warn!("Document store has no migration history");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                latest_migration: None,
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
                document_count: 0,
            });
        }

        let migrations_applied =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(&self.pool)
                .await?;
        let latest_migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let mut missing_tables = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing_tables.push(table.to_string());
            }
        }

        let document_count = if missing_tables.is_empty() {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
                .fetch_one(&self.pool)
                .await?
        } else {
            0
        };

        let result = ValidationResult {
            is_initialized: true,
            migrations_applied: usize::try_from(migrations_applied).unwrap_or_default(),
            latest_migration,
            missing_tables,
            document_count: usize::try_from(document_count).unwrap_or_default(),
        };
        info!(
            migrations_applied = result.migrations_applied,
            documents = result.document_count,
            "Document store validated"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
    pub document_count: usize,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Document store not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!("Missing tables: {}", self.missing_tables.join(", "))
        } else {
            format!(
                "Document store OK - {} migrations applied, {} documents",
                self.migrations_applied, self.document_count
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, DocumentStore, SqliteDocumentStore, store::CollectionPath};
    use serde_json::{Map, json};

    use super::*;

    #[tokio::test]
    async fn migrated_database_is_healthy() {
        let db = DBService::new_in_memory().await.unwrap();
        let store = SqliteDocumentStore::new(&db);
        let mut data = Map::new();
        data.insert("name".to_string(), json!("Rye"));
        store
            .create(&CollectionPath::business("biz_1", "products"), data)
            .await
            .unwrap();

        let result = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();

        assert!(result.is_ok(), "{}", result.summary());
        assert!(result.migrations_applied >= 1);
        assert_eq!(result.document_count, 1);
        assert_eq!(result.latest_migration.as_deref(), Some("documents"));
    }

    #[tokio::test]
    async fn empty_database_is_not_initialized() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let result = DatabaseValidator::new(pool).validate().await.unwrap();

        assert!(!result.is_ok());
        assert!(!result.is_initialized);
        assert_eq!(result.missing_tables, vec!["documents".to_string()]);
    }
}
