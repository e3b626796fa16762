//! Per-document progress persistence
//!
//! State is stored as one JSON document per document id in `link_progress`.

use async_trait::async_trait;
use chrono::Utc;
use citelink_common::{Error, Result};
use sqlx::SqlitePool;

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT};
use crate::models::ProgressState;
use crate::services::engine::ProgressStore;

/// Progress store bound to one document
pub struct SqliteProgressStore {
    pool: SqlitePool,
    document_id: String,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool, document_id: impl Into<String>) -> Self {
        Self {
            pool,
            document_id: document_id.into(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn load(&self) -> Result<Option<ProgressState>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state FROM link_progress WHERE document_id = ?")
                .bind(&self.document_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => serde_json::from_str(&json).map(Some).map_err(|e| {
                Error::InvalidInput(format!(
                    "Corrupt progress state for {}: {}",
                    self.document_id, e
                ))
            }),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &ProgressState) -> Result<()> {
        // Serialize before touching the database
        let json = serde_json::to_string(state)
            .map_err(|e| Error::Internal(format!("Failed to serialize progress: {}", e)))?;
        let updated_at = Utc::now().to_rfc3339();

        retry_on_lock("save_progress", DEFAULT_MAX_LOCK_WAIT, || async {
            sqlx::query(
                r#"
                INSERT INTO link_progress (document_id, state, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(document_id) DO UPDATE SET
                    state = excluded.state,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.document_id)
            .bind(&json)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM link_progress WHERE document_id = ?")
            .bind(&self.document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
