//! Append-only trail of account and content changes.

use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Appends one row to `audit_logs`.
///
/// The trail is best effort: a failed insert is logged and swallowed so it
/// never turns a completed change into an error response.
pub async fn record(pool: &DbPool, user_id: Uuid, action: &str, resource: &str, metadata: Value) {
    let inserted = sqlx::query(
        r#"
        INSERT INTO audit_logs (user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(&metadata)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => tracing::debug!(%user_id, action, resource, "audit recorded"),
        Err(err) => tracing::warn!(error = %err, %user_id, action, "audit log failed"),
    }
}
