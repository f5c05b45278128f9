//! Domain-level error type used across core services. HTTP- and DB-agnostic.
//! Handlers convert it to [`crate::error::AppError`] at the boundary.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::errors::error_code::ErrorCode;

/// Domain-level "not found" entities.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotFoundKind {
    Key,
    Sae,
    User,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictKind {
    AlreadyRegistered,
    SyncInProgress,
    Other(String),
}

/// Central domain error type, one variant per kind in spec §7.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    Validation(String),
    UnknownSae(String),
    NotFound(NotFoundKind, String),
    PartialResult { found: usize, requested: usize },
    KeysUnavailable(String),
    Conflict(ConflictKind, String),
    InsufficientKeys { available: usize, requested: usize },
    Forbidden(String),
    Transport(String),
    Config(String),
    Internal(String),
    Db(String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(d) => write!(f, "validation error: {d}"),
            DomainError::UnknownSae(d) => write!(f, "unknown SAE: {d}"),
            DomainError::NotFound(kind, d) => write!(f, "not found {kind:?}: {d}"),
            DomainError::PartialResult { found, requested } => {
                write!(f, "partial result: found {found} of {requested} requested keys")
            }
            DomainError::KeysUnavailable(d) => write!(f, "keys unavailable: {d}"),
            DomainError::Conflict(kind, d) => write!(f, "conflict {kind:?}: {d}"),
            DomainError::InsufficientKeys {
                available,
                requested,
            } => write!(
                f,
                "insufficient keys: {available} available, {requested} requested"
            ),
            DomainError::Forbidden(d) => write!(f, "forbidden: {d}"),
            DomainError::Transport(d) => write!(f, "transport error: {d}"),
            DomainError::Config(d) => write!(f, "configuration error: {d}"),
            DomainError::Internal(d) => write!(f, "internal error: {d}"),
            DomainError::Db(d) => write!(f, "database error: {d}"),
        }
    }
}

impl std::error::Error for DomainError {}

impl DomainError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }
    pub fn unknown_sae(detail: impl Into<String>) -> Self {
        Self::UnknownSae(detail.into())
    }
    pub fn not_found(kind: NotFoundKind, detail: impl Into<String>) -> Self {
        Self::NotFound(kind, detail.into())
    }
    pub fn keys_unavailable(detail: impl Into<String>) -> Self {
        Self::KeysUnavailable(detail.into())
    }
    pub fn conflict(kind: ConflictKind, detail: impl Into<String>) -> Self {
        Self::Conflict(kind, detail.into())
    }
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport(detail.into())
    }
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config(detail.into())
    }
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }
    pub fn db(detail: impl Into<String>) -> Self {
        Self::Db(detail.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Validation(_) => ErrorCode::ValidationError,
            DomainError::UnknownSae(_) => ErrorCode::UnknownSae,
            DomainError::NotFound(..) => ErrorCode::NotFound,
            DomainError::PartialResult { .. } => ErrorCode::PartialResult,
            DomainError::KeysUnavailable(_) => ErrorCode::KeysUnavailable,
            DomainError::Conflict(ConflictKind::AlreadyRegistered, _) => ErrorCode::AlreadyExists,
            DomainError::Conflict(ConflictKind::SyncInProgress, _) => ErrorCode::Busy,
            DomainError::Conflict(ConflictKind::Other(_), _) => ErrorCode::BadRequest,
            DomainError::InsufficientKeys { .. } => ErrorCode::InsufficientKeys,
            DomainError::Forbidden(_) => ErrorCode::Forbidden,
            DomainError::Transport(_) => ErrorCode::TransportError,
            DomainError::Config(_) => ErrorCode::ConfigError,
            DomainError::Internal(_) => ErrorCode::Internal,
            DomainError::Db(_) => ErrorCode::DbError,
        }
    }
}
