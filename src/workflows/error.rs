use crate::assets::models::{AssetType, LinkRole};
use crate::assets::tags::TagError;
use crate::context::Role;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Rejected before any store call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Nothing to create: every line is blank or has no name")]
    NoBatchLines,

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Name cannot be empty")]
    EmptyName,

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("Invalid {asset_type} update: {reason}")]
    InvalidPatch { asset_type: AssetType, reason: String },

    #[error("Team member {0} does not belong to this team")]
    ManagerNotInTeam(Uuid),

    #[error("Profile is already linked to this business manager as {0}")]
    DuplicateLink(LinkRole),

    #[error("No assets selected")]
    EmptySelection,

    #[error("No fields to update")]
    EmptyPatch,
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Role {role} is not allowed to {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: Uuid },

    #[error("{asset_type} is still referenced: {detail}")]
    ReferentialIntegrity { asset_type: AssetType, detail: String },

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for MutationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ReferentialIntegrity { asset_type, detail } => {
                Self::ReferentialIntegrity { asset_type, detail }
            }
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl MutationError {
    pub fn not_found(asset_type: AssetType, id: Uuid) -> Self {
        Self::NotFound {
            entity: asset_type.to_string(),
            id,
        }
    }

    /// Notification text for the operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Forbidden { .. } => "You do not have permission to do this".to_string(),
            Self::NotFound { .. } => "The asset no longer exists".to_string(),
            Self::ReferentialIntegrity {
                asset_type: AssetType::Profile,
                ..
            } => "This profile is still linked to pages or business managers. Unlink it first."
                .to_string(),
            Self::ReferentialIntegrity {
                asset_type: AssetType::Organization,
                ..
            } => "This business manager is still linked to other assets \
                  (ad accounts, pages or profiles)."
                .to_string(),
            Self::ReferentialIntegrity { .. } | Self::Store(_) => {
                "The operation failed. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referential_messages_are_specific() {
        let profile: MutationError = StoreError::referenced(AssetType::Profile, "fk").into();
        let org: MutationError = StoreError::referenced(AssetType::Organization, "fk").into();
        let account: MutationError = StoreError::referenced(AssetType::AdAccount, "fk").into();
        let backend: MutationError = StoreError::Backend("timeout".into()).into();

        assert!(profile.user_message().contains("profile is still linked to pages"));
        assert!(org
            .user_message()
            .contains("business manager is still linked to other assets"));
        assert_eq!(account.user_message(), backend.user_message());
        assert_ne!(profile.user_message(), org.user_message());
    }

    #[test]
    fn test_validation_message_passthrough() {
        let err: MutationError = ValidationError::MissingField {
            field: "organization_id",
        }
        .into();
        assert_eq!(err.user_message(), "organization_id is required");
    }
}
