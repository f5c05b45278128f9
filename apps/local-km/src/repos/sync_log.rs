//! Sync-audit trail (§4.G step 8, §4.H).

use kme_core::errors::domain::DomainError;
use sea_orm::{ActiveModelTrait, ConnectionTrait, NotSet, Set};
use time::OffsetDateTime;

use crate::entities::sync_logs;

pub async fn append(
    conn: &impl ConnectionTrait,
    reason: &str,
    fallback: Option<&str>,
    users_synced: i32,
    keys_delivered: i32,
    error_detail: Option<&str>,
) -> Result<(), DomainError> {
    let active = sync_logs::ActiveModel {
        id: NotSet,
        reason: Set(reason.to_string()),
        fallback: Set(fallback.map(str::to_string)),
        users_synced: Set(users_synced),
        keys_delivered: Set(keys_delivered),
        error_detail: Set(error_detail.map(str::to_string)),
        created_at: Set(OffsetDateTime::now_utc()),
    };
    active
        .insert(conn)
        .await
        .map(|_| ())
        .map_err(|e| DomainError::db(e.to_string()))
}
