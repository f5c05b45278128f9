//! Per-user pool repository (§4.F) — generic over `ConnectionTrait`, folding
//! the SeaORM query layer directly into the domain repo since this schema is
//! a handful of tables rather than nommie's dozen-entity graph.

use kme_core::errors::domain::DomainError;
use kme_core::model::KeyRecord as GeneratedKey;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use time::OffsetDateTime;

use crate::entities::{keys, users};

/// Domain model for a registered SAE's pool owner row.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolUser {
    pub sae_id: String,
    pub email: String,
    pub pool_size_limit: i64,
    pub created_at: OffsetDateTime,
    pub last_refill_at: Option<OffsetDateTime>,
}

impl From<users::Model> for PoolUser {
    fn from(model: users::Model) -> Self {
        Self {
            sae_id: model.sae_id,
            email: model.email,
            pool_size_limit: model.pool_size_limit,
            created_at: model.created_at,
            last_refill_at: model.last_refill_at,
        }
    }
}

/// Domain model for a single persisted pool key.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolKey {
    pub key_id: String,
    pub sae_id: String,
    pub key_material: Vec<u8>,
    pub used: bool,
    pub created_at: OffsetDateTime,
    pub used_at: Option<OffsetDateTime>,
    pub used_by_sae_id: Option<String>,
}

impl From<keys::Model> for PoolKey {
    fn from(model: keys::Model) -> Self {
        Self {
            key_id: model.key_id,
            sae_id: model.sae_id,
            key_material: kme_core::wire::decode(&model.key_material).unwrap_or_default(),
            used: model.state == keys::KeyState::Used,
            created_at: model.created_at,
            used_at: model.used_at,
            used_by_sae_id: model.used_by_sae_id,
        }
    }
}

pub async fn find_user<C: ConnectionTrait>(
    conn: &C,
    sae_id: &str,
) -> Result<Option<PoolUser>, DomainError> {
    users::Entity::find_by_id(sae_id)
        .one(conn)
        .await
        .map(|m| m.map(PoolUser::from))
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn list_users<C: ConnectionTrait>(conn: &C) -> Result<Vec<PoolUser>, DomainError> {
    users::Entity::find()
        .order_by_asc(users::Column::SaeId)
        .all(conn)
        .await
        .map(|rows| rows.into_iter().map(PoolUser::from).collect())
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn create_user<C: ConnectionTrait>(
    conn: &C,
    sae_id: &str,
    email: &str,
    pool_size_limit: i64,
) -> Result<PoolUser, DomainError> {
    let now = OffsetDateTime::now_utc();
    let active = users::ActiveModel {
        sae_id: Set(sae_id.to_string()),
        email: Set(email.to_string()),
        pool_size_limit: Set(pool_size_limit),
        created_at: Set(now),
        last_refill_at: Set(None),
    };
    active
        .insert(conn)
        .await
        .map(PoolUser::from)
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn delete_keys_for_user<C: ConnectionTrait>(conn: &C, sae_id: &str) -> Result<(), DomainError> {
    keys::Entity::delete_many()
        .filter(keys::Column::SaeId.eq(sae_id))
        .exec(conn)
        .await
        .map(|_| ())
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn delete_user<C: ConnectionTrait>(conn: &C, sae_id: &str) -> Result<(), DomainError> {
    users::Entity::delete_by_id(sae_id)
        .exec(conn)
        .await
        .map(|_| ())
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn touch_last_refill<C: ConnectionTrait>(conn: &C, sae_id: &str) -> Result<(), DomainError> {
    let mut active = users::ActiveModel {
        sae_id: Set(sae_id.to_string()),
        ..Default::default()
    };
    active.last_refill_at = Set(Some(OffsetDateTime::now_utc()));
    active
        .update(conn)
        .await
        .map(|_| ())
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn insert_generated_keys<C: ConnectionTrait>(
    conn: &C,
    sae_id: &str,
    generated: &[GeneratedKey],
) -> Result<(), DomainError> {
    let now = OffsetDateTime::now_utc();
    for key in generated {
        let active = keys::ActiveModel {
            key_id: Set(key.key_id.clone()),
            sae_id: Set(sae_id.to_string()),
            key_material: Set(kme_core::wire::encode(&key.key_material)),
            state: Set(keys::KeyState::Available),
            created_at: Set(now),
            used_at: NotSet,
            used_by_sae_id: NotSet,
        };
        active
            .insert(conn)
            .await
            .map_err(|e| DomainError::db(e.to_string()))?;
    }
    Ok(())
}

pub async fn count_available<C: ConnectionTrait>(conn: &C, sae_id: &str) -> Result<u64, DomainError> {
    keys::Entity::find()
        .filter(keys::Column::SaeId.eq(sae_id))
        .filter(keys::Column::State.eq(keys::KeyState::Available))
        .count(conn)
        .await
        .map_err(|e| DomainError::db(e.to_string()))
}

pub async fn count_total<C: ConnectionTrait>(conn: &C, sae_id: &str) -> Result<u64, DomainError> {
    keys::Entity::find()
        .filter(keys::Column::SaeId.eq(sae_id))
        .count(conn)
        .await
        .map_err(|e| DomainError::db(e.to_string()))
}

/// Oldest-first page of `sae_id`'s available keys, for the FIFO hand-out rule.
pub async fn oldest_available<C: ConnectionTrait>(
    conn: &C,
    sae_id: &str,
    limit: u64,
) -> Result<Vec<PoolKey>, DomainError> {
    keys::Entity::find()
        .filter(keys::Column::SaeId.eq(sae_id))
        .filter(keys::Column::State.eq(keys::KeyState::Available))
        .order_by_asc(keys::Column::CreatedAt)
        .limit(limit)
        .all(conn)
        .await
        .map(|rows| rows.into_iter().map(PoolKey::from).collect())
        .map_err(|e| DomainError::db(e.to_string()))
}

/// Marks the given keys `used`, attributing them to `used_by_sae_id`.
pub async fn mark_used<C: ConnectionTrait>(
    conn: &C,
    key_ids: &[String],
    used_by_sae_id: &str,
) -> Result<(), DomainError> {
    let now = OffsetDateTime::now_utc();
    for key_id in key_ids {
        let mut active = keys::ActiveModel {
            key_id: Set(key_id.clone()),
            ..Default::default()
        };
        active.state = Set(keys::KeyState::Used);
        active.used_at = Set(Some(now));
        active.used_by_sae_id = Set(Some(used_by_sae_id.to_string()));
        active
            .update(conn)
            .await
            .map_err(|e| DomainError::db(e.to_string()))?;
    }
    Ok(())
}

/// Fetches already-`used` keys by id, filtered to ones the caller is entitled
/// to see: either the one who consumed them or the pool owner (§4.F).
pub async fn find_used_keys_for_caller<C: ConnectionTrait>(
    conn: &C,
    caller_sae: &str,
    key_ids: &[String],
) -> Result<Vec<PoolKey>, DomainError> {
    let rows = keys::Entity::find()
        .filter(keys::Column::KeyId.is_in(key_ids.to_vec()))
        .filter(keys::Column::State.eq(keys::KeyState::Used))
        .all(conn)
        .await
        .map_err(|e| DomainError::db(e.to_string()))?;

    Ok(rows
        .into_iter()
        .map(PoolKey::from)
        .filter(|k| k.used_by_sae_id.as_deref() == Some(caller_sae) || k.sae_id == caller_sae)
        .collect())
}
