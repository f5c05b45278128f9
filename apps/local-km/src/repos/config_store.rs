//! Local KM config key-value table (§4.H) — single required row `last_sync_time`.

use kme_core::errors::domain::DomainError;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use time::OffsetDateTime;

use crate::entities::local_km_config;

pub async fn get(conn: &impl ConnectionTrait, key: &str) -> Result<Option<String>, DomainError> {
    local_km_config::Entity::find_by_id(key)
        .one(conn)
        .await
        .map(|m| m.map(|m| m.value))
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn set(conn: &impl ConnectionTrait, key: &str, value: &str) -> Result<(), DomainError> {
    let existing = local_km_config::Entity::find_by_id(key)
        .one(conn)
        .await
        .map_err(|e| DomainError::db(e.to_string()))?;

    let active = local_km_config::ActiveModel {
        key: Set(key.to_string()),
        value: Set(value.to_string()),
        updated_at: Set(OffsetDateTime::now_utc()),
    };

    let result = if existing.is_some() {
        active.update(conn).await
    } else {
        active.insert(conn).await
    };
    result.map(|_| ()).map_err(|e| DomainError::db(e.to_string()))
}
