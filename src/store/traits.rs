//! AssetStore trait definition
//!
//! The persistence boundary for the desk. Every call is scoped to one team and
//! is all-or-nothing: it either fully succeeds or leaves its table untouched.
//! Separate calls (for instance one delete per asset type) succeed or fail
//! independently.

use super::error::StoreResult;
use crate::activity::models::{ActivityLogEntry, ActivityQuery};
use crate::assets::models::*;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait AssetStore: Send + Sync {
    // ========================================================================
    // Profiles
    // ========================================================================

    async fn list_profiles(&self, team_id: Uuid) -> StoreResult<Vec<Profile>>;

    async fn create_profiles(&self, team_id: Uuid, rows: &[Profile]) -> StoreResult<()>;

    /// Apply one sparse patch to every listed id of the team
    async fn update_profiles(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &ProfilePatch,
    ) -> StoreResult<()>;

    /// Fails if any profile is still referenced by a page or an organization link
    async fn delete_profiles(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()>;

    // ========================================================================
    // Organizations
    // ========================================================================

    async fn list_organizations(&self, team_id: Uuid) -> StoreResult<Vec<Organization>>;

    async fn create_organizations(&self, team_id: Uuid, rows: &[Organization]) -> StoreResult<()>;

    async fn update_organizations(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &OrganizationPatch,
    ) -> StoreResult<()>;

    /// Fails if any organization still owns ad accounts, pages or links
    async fn delete_organizations(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()>;

    // ========================================================================
    // Ad accounts
    // ========================================================================

    /// Rows carry the resolved organization name
    async fn list_ad_accounts(&self, team_id: Uuid) -> StoreResult<Vec<AdAccount>>;

    async fn create_ad_accounts(&self, team_id: Uuid, rows: &[AdAccount]) -> StoreResult<()>;

    async fn update_ad_accounts(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &AdAccountPatch,
    ) -> StoreResult<()>;

    /// Fails if any ad account is the current account of a page
    async fn delete_ad_accounts(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()>;

    // ========================================================================
    // Pages
    // ========================================================================

    /// Rows carry the resolved origin/current organization, ad account,
    /// manager and profile names
    async fn list_pages(&self, team_id: Uuid) -> StoreResult<Vec<Page>>;

    async fn create_pages(&self, team_id: Uuid, rows: &[Page]) -> StoreResult<()>;

    async fn update_pages(&self, team_id: Uuid, ids: &[Uuid], patch: &PagePatch)
        -> StoreResult<()>;

    async fn delete_pages(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()>;

    // ========================================================================
    // Profile ↔ organization links
    // ========================================================================

    /// Links of the team, optionally restricted to one profile. Rows carry
    /// the resolved organization name.
    async fn list_profile_links(
        &self,
        team_id: Uuid,
        profile_id: Option<Uuid>,
    ) -> StoreResult<Vec<ProfileOrganizationLink>>;

    async fn create_profile_link(
        &self,
        team_id: Uuid,
        link: &ProfileOrganizationLink,
    ) -> StoreResult<()>;

    async fn delete_profile_link(&self, team_id: Uuid, id: Uuid) -> StoreResult<()>;

    // ========================================================================
    // Team members (read-only)
    // ========================================================================

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>>;

    // ========================================================================
    // Activity log (append-only)
    // ========================================================================

    async fn append_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()>;

    /// Newest first, capped at the query's effective limit
    async fn query_activity(
        &self,
        team_id: Uuid,
        query: &ActivityQuery,
    ) -> StoreResult<Vec<ActivityLogEntry>>;
}
