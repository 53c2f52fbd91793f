//! Voiceover task persistence
//!
//! Tasks are stored as a JSON payload with a few indexed columns pulled
//! out for querying. Every state transition upserts the row, so the
//! database always reflects the latest snapshot the owning worker wrote.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use scenecast_common::Result;

use crate::models::AudioTask;
use crate::utils::retry_on_lock;

/// Maximum time to wait out SQLite lock contention (milliseconds)
const MAX_LOCK_WAIT_MS: u64 = 5000;

/// Save (insert or update) a task snapshot
pub async fn save_task(pool: &SqlitePool, task: &AudioTask) -> Result<()> {
    // Prepare all data BEFORE acquiring a database connection
    let task_id = task.task_id.to_string();
    let state = serde_json::to_string(&task.state)
        .map_err(|e| scenecast_common::Error::Internal(format!("Failed to serialize state: {}", e)))?;
    let payload = serde_json::to_string(task)
        .map_err(|e| scenecast_common::Error::Internal(format!("Failed to serialize task: {}", e)))?;
    let voice_id = task.voice_id.clone();
    let language = task.language.clone();
    let created_at = task.created_at.to_rfc3339();
    let updated_at = task.updated_at.to_rfc3339();

    retry_on_lock("save_task", MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO voiceover_tasks (
                task_id, state, voice_id, language, payload, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id) DO UPDATE SET
                state = excluded.state,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&task_id)
        .bind(&state)
        .bind(&voice_id)
        .bind(&language)
        .bind(&payload)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await
        .map_err(scenecast_common::Error::Database)?;

        Ok(())
    })
    .await
}

/// Load a task snapshot by id
pub async fn load_task(pool: &SqlitePool, task_id: Uuid) -> Result<Option<AudioTask>> {
    let task_id_str = task_id.to_string();

    let row = sqlx::query("SELECT payload FROM voiceover_tasks WHERE task_id = ?")
        .bind(task_id_str)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let payload: String = row.get("payload");
            let task: AudioTask = serde_json::from_str(&payload).map_err(|e| {
                scenecast_common::Error::Internal(format!("Failed to deserialize task: {}", e))
            })?;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}
