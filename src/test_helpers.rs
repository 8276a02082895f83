//! Test helper factories and mock state builders
//!
//! Provides convenience functions for creating test objects with sensible defaults,
//! and helpers for building mock AppState / server state instances.
#![allow(dead_code)]

use crate::api::handlers::{DeskState, ServerState};
use crate::assets::models::*;
use crate::context::{Role, TeamContext};
use crate::store::MemoryStore;
use crate::workflows::AssetManager;
use crate::{AppState, AuthConfig, Config, StoreBackend};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

// ============================================================================
// Mock state builders
// ============================================================================

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        store_backend: StoreBackend::Memory,
        sqlite_path: ":memory:".to_string(),
        utc_offset_minutes: 0,
        auth_config: None,
        team_members: vec![],
    }
}

/// Create a mock AppState over an empty in-memory store
pub fn mock_app_state() -> AppState {
    AppState::with_store(Arc::new(MemoryStore::new()), test_config())
}

/// Create a test AuthConfig with a fixed secret
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry_secs: 900,
    }
}

/// Server state over an empty in-memory store
pub fn test_server_state(auth_config: Option<AuthConfig>) -> DeskState {
    Arc::new(ServerState {
        manager: Arc::new(AssetManager::new(Arc::new(MemoryStore::new()))),
        auth_config,
    })
}

/// Full `Authorization` header value for `ctx`, signed with [`TEST_SECRET`].
pub fn test_bearer_token(ctx: &TeamContext) -> String {
    let token = crate::auth::jwt::encode_jwt(
        ctx.user_id,
        ctx.team_id,
        ctx.role,
        ctx.actor(),
        TEST_SECRET,
        3600,
    )
    .expect("test token encoding should succeed");
    format!("Bearer {}", token)
}

// ============================================================================
// Test data factories
// ============================================================================

/// A caller in a fresh team, named "Test User"
pub fn test_context(role: Role) -> TeamContext {
    TeamContext::new(Uuid::new_v4(), Uuid::new_v4(), role).with_actor_name("Test User")
}

pub fn test_profile(team_id: Uuid, name: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        profile_url: None,
        status: ProfileStatus::Active,
        received_at: NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
        blocked_at: None,
        tags: vec![],
        created_by: None,
        created_at: Utc::now(),
    }
}

pub fn test_organization(team_id: Uuid, name: &str) -> Organization {
    Organization {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        external_id: None,
        tags: vec![],
        created_by: None,
        created_at: Utc::now(),
    }
}

/// An active ad account, optionally owned by `organization`
pub fn test_ad_account(
    team_id: Uuid,
    name: &str,
    organization: Option<&Organization>,
) -> AdAccount {
    AdAccount {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        external_id: None,
        status: AdAccountStatus::Active,
        organization_id: organization.map(|o| o.id),
        organization_name: organization.map(|o| o.name.clone()),
        tags: vec![],
        created_by: None,
        created_at: Utc::now(),
    }
}

/// An available page originating from `origin`
pub fn test_page(team_id: Uuid, name: &str, origin: &Organization) -> Page {
    Page {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        external_id: None,
        status: PageStatus::Available,
        origin_organization_id: origin.id,
        origin_organization_name: Some(origin.name.clone()),
        current_organization_id: None,
        current_organization_name: None,
        current_ad_account_id: None,
        current_ad_account_name: None,
        current_manager_id: None,
        current_manager_name: None,
        current_profile_id: None,
        current_profile_name: None,
        usage_started_on: None,
        tags: vec![],
        created_by: None,
        created_at: Utc::now(),
    }
}

pub fn test_team_member(team_id: Uuid, name: &str, role: Role) -> TeamMember {
    TeamMember {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        role,
    }
}

pub fn test_link(
    team_id: Uuid,
    profile: &Profile,
    organization: &Organization,
    role: LinkRole,
) -> ProfileOrganizationLink {
    ProfileOrganizationLink {
        id: Uuid::new_v4(),
        team_id,
        profile_id: profile.id,
        organization_id: organization.id,
        role,
        organization_name: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_app_state_creation() {
        let state = mock_app_state();
        assert_eq!(state.config.store_backend, StoreBackend::Memory);
        assert!(state.config.auth_config.is_none());
    }

    #[test]
    fn test_factory_functions_produce_valid_objects() {
        let team = Uuid::new_v4();
        let org = test_organization(team, "BM");
        let page = test_page(team, "Page", &org);
        assert_eq!(page.origin_organization_id, org.id);
        assert_eq!(page.status, PageStatus::Available);

        let account = test_ad_account(team, "Acc", Some(&org));
        assert_eq!(account.organization_id, Some(org.id));

        let ctx = test_context(Role::Member);
        assert_eq!(ctx.actor(), "Test User");
    }

    #[tokio::test]
    async fn test_mock_state_manager_lists_nothing() {
        let state = mock_app_state();
        let ctx = test_context(Role::Viewer);
        let assets = state
            .manager
            .list_assets(&ctx, &Default::default())
            .await
            .unwrap();
        assert!(assets.is_empty());
    }
}
