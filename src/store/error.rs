use crate::assets::models::AssetType;
use thiserror::Error;
use uuid::Uuid;

/// Failure reported by an [`AssetStore`](super::AssetStore) call. A failed call
/// leaves its table untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A foreign-key reference blocks the write
    #[error("{asset_type} is still referenced: {detail}")]
    ReferentialIntegrity { asset_type: AssetType, detail: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: Uuid },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: impl ToString, id: Uuid) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id,
        }
    }

    pub fn referenced(asset_type: AssetType, detail: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            asset_type,
            detail: detail.into(),
        }
    }

    pub fn is_referential(&self) -> bool {
        matches!(self, Self::ReferentialIntegrity { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
