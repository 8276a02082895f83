//! In-memory implementation of AssetStore.
//!
//! Backs tests and the `memory` store backend. Collections live in
//! `tokio::sync::RwLock<HashMap<K, V>>`s and foreign keys are checked by hand,
//! with the same outcomes SQLite reports. Locks are always taken in field
//! declaration order.

use super::error::{StoreError, StoreResult};
use super::traits::AssetStore;
use crate::activity::models::{ActivityLogEntry, ActivityQuery};
use crate::assets::models::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    pub profiles: RwLock<HashMap<Uuid, Profile>>,
    pub organizations: RwLock<HashMap<Uuid, Organization>>,
    pub ad_accounts: RwLock<HashMap<Uuid, AdAccount>>,
    pub pages: RwLock<HashMap<Uuid, Page>>,
    pub links: RwLock<HashMap<Uuid, ProfileOrganizationLink>>,
    pub team_members: RwLock<HashMap<Uuid, TeamMember>>,
    pub activity: RwLock<Vec<ActivityLogEntry>>,
    reject_activity: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a team member (builder pattern)
    pub fn with_team_member(mut self, member: TeamMember) -> Self {
        self.team_members.get_mut().insert(member.id, member);
        self
    }

    pub async fn add_team_member(&self, member: TeamMember) {
        self.team_members.write().await.insert(member.id, member);
    }

    /// Make every subsequent activity append fail, to exercise best-effort paths.
    pub fn reject_activity_appends(&self, reject: bool) {
        self.reject_activity.store(reject, Ordering::SeqCst);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn newest_first<T>(
    mut rows: Vec<T>,
    created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
) -> Vec<T> {
    rows.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    rows
}

fn ensure_new_ids<V>(
    existing: &HashMap<Uuid, V>,
    ids: impl IntoIterator<Item = Uuid>,
) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if existing.contains_key(&id) || !seen.insert(id) {
            return Err(StoreError::Backend(format!("duplicate id {}", id)));
        }
    }
    Ok(())
}

fn owned_by_team<'a, V>(
    rows: &'a HashMap<Uuid, V>,
    team_id: Uuid,
    ids: &'a [Uuid],
    team_of: impl Fn(&V) -> Uuid + 'a,
) -> impl Iterator<Item = Uuid> + 'a {
    ids.iter()
        .copied()
        .filter(move |id| rows.get(id).is_some_and(|row| team_of(row) == team_id))
}

fn check_organization(
    organizations: &HashMap<Uuid, Organization>,
    team_id: Uuid,
    id: Uuid,
    asset_type: AssetType,
) -> StoreResult<()> {
    match organizations.get(&id) {
        Some(org) if org.team_id == team_id => Ok(()),
        _ => Err(StoreError::referenced(
            asset_type,
            format!("organization {} does not exist", id),
        )),
    }
}

struct PageRefs<'a> {
    team_id: Uuid,
    profiles: &'a HashMap<Uuid, Profile>,
    organizations: &'a HashMap<Uuid, Organization>,
    ad_accounts: &'a HashMap<Uuid, AdAccount>,
    team_members: &'a HashMap<Uuid, TeamMember>,
}

impl PageRefs<'_> {
    fn check(&self, page: &Page) -> StoreResult<()> {
        check_organization(
            self.organizations,
            self.team_id,
            page.origin_organization_id,
            AssetType::Page,
        )?;
        if let Some(org) = page.current_organization_id {
            check_organization(self.organizations, self.team_id, org, AssetType::Page)?;
        }
        if let Some(account) = page.current_ad_account_id {
            if !self
                .ad_accounts
                .get(&account)
                .is_some_and(|a| a.team_id == self.team_id)
            {
                return Err(StoreError::referenced(
                    AssetType::Page,
                    format!("ad account {} does not exist", account),
                ));
            }
        }
        if let Some(profile) = page.current_profile_id {
            if !self
                .profiles
                .get(&profile)
                .is_some_and(|p| p.team_id == self.team_id)
            {
                return Err(StoreError::referenced(
                    AssetType::Page,
                    format!("profile {} does not exist", profile),
                ));
            }
        }
        if let Some(manager) = page.current_manager_id {
            if !self
                .team_members
                .get(&manager)
                .is_some_and(|m| m.team_id == self.team_id)
            {
                return Err(StoreError::referenced(
                    AssetType::Page,
                    format!("team member {} does not exist", manager),
                ));
            }
        }
        Ok(())
    }

    fn resolve(&self, mut page: Page) -> Page {
        page.origin_organization_name = self
            .organizations
            .get(&page.origin_organization_id)
            .map(|o| o.name.clone());
        page.current_organization_name = page
            .current_organization_id
            .and_then(|id| self.organizations.get(&id))
            .map(|o| o.name.clone());
        page.current_ad_account_name = page
            .current_ad_account_id
            .and_then(|id| self.ad_accounts.get(&id))
            .map(|a| a.name.clone());
        page.current_manager_name = page
            .current_manager_id
            .and_then(|id| self.team_members.get(&id))
            .map(|m| m.name.clone());
        page.current_profile_name = page
            .current_profile_id
            .and_then(|id| self.profiles.get(&id))
            .map(|p| p.name.clone());
        page
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    // ========================================================================
    // Profiles
    // ========================================================================

    async fn list_profiles(&self, team_id: Uuid) -> StoreResult<Vec<Profile>> {
        let profiles = self.profiles.read().await;
        let rows = profiles
            .values()
            .filter(|p| p.team_id == team_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |p: &Profile| p.created_at))
    }

    async fn create_profiles(&self, team_id: Uuid, rows: &[Profile]) -> StoreResult<()> {
        let mut profiles = self.profiles.write().await;
        ensure_new_ids(&profiles, rows.iter().map(|r| r.id))?;
        for row in rows {
            let mut row = row.clone();
            row.team_id = team_id;
            profiles.insert(row.id, row);
        }
        Ok(())
    }

    async fn update_profiles(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &ProfilePatch,
    ) -> StoreResult<()> {
        let mut profiles = self.profiles.write().await;
        let targets: Vec<Uuid> = owned_by_team(&profiles, team_id, ids, |p| p.team_id).collect();
        for id in targets {
            if let Some(profile) = profiles.get_mut(&id) {
                patch.apply_to(profile);
            }
        }
        Ok(())
    }

    async fn delete_profiles(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let mut profiles = self.profiles.write().await;
        let pages = self.pages.read().await;
        let links = self.links.read().await;

        let targets: HashSet<Uuid> =
            owned_by_team(&profiles, team_id, ids, |p| p.team_id).collect();
        if let Some(page) = pages
            .values()
            .find(|p| p.current_profile_id.is_some_and(|id| targets.contains(&id)))
        {
            return Err(StoreError::referenced(
                AssetType::Profile,
                format!("page \"{}\" references the profile", page.name),
            ));
        }
        if links.values().any(|l| targets.contains(&l.profile_id)) {
            return Err(StoreError::referenced(
                AssetType::Profile,
                "profile is linked to an organization",
            ));
        }

        for id in targets {
            profiles.remove(&id);
        }
        Ok(())
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    async fn list_organizations(&self, team_id: Uuid) -> StoreResult<Vec<Organization>> {
        let organizations = self.organizations.read().await;
        let rows = organizations
            .values()
            .filter(|o| o.team_id == team_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |o: &Organization| o.created_at))
    }

    async fn create_organizations(&self, team_id: Uuid, rows: &[Organization]) -> StoreResult<()> {
        let mut organizations = self.organizations.write().await;
        ensure_new_ids(&organizations, rows.iter().map(|r| r.id))?;
        for row in rows {
            let mut row = row.clone();
            row.team_id = team_id;
            organizations.insert(row.id, row);
        }
        Ok(())
    }

    async fn update_organizations(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &OrganizationPatch,
    ) -> StoreResult<()> {
        let mut organizations = self.organizations.write().await;
        let targets: Vec<Uuid> =
            owned_by_team(&organizations, team_id, ids, |o| o.team_id).collect();
        for id in targets {
            if let Some(org) = organizations.get_mut(&id) {
                patch.apply_to(org);
            }
        }
        Ok(())
    }

    async fn delete_organizations(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let mut organizations = self.organizations.write().await;
        let ad_accounts = self.ad_accounts.read().await;
        let pages = self.pages.read().await;
        let links = self.links.read().await;

        let targets: HashSet<Uuid> =
            owned_by_team(&organizations, team_id, ids, |o| o.team_id).collect();
        if let Some(account) = ad_accounts
            .values()
            .find(|a| a.organization_id.is_some_and(|id| targets.contains(&id)))
        {
            return Err(StoreError::referenced(
                AssetType::Organization,
                format!("ad account \"{}\" belongs to the organization", account.name),
            ));
        }
        if let Some(page) = pages.values().find(|p| {
            targets.contains(&p.origin_organization_id)
                || p.current_organization_id.is_some_and(|id| targets.contains(&id))
        }) {
            return Err(StoreError::referenced(
                AssetType::Organization,
                format!("page \"{}\" references the organization", page.name),
            ));
        }
        if links.values().any(|l| targets.contains(&l.organization_id)) {
            return Err(StoreError::referenced(
                AssetType::Organization,
                "a profile is linked to the organization",
            ));
        }

        for id in targets {
            organizations.remove(&id);
        }
        Ok(())
    }

    // ========================================================================
    // Ad accounts
    // ========================================================================

    async fn list_ad_accounts(&self, team_id: Uuid) -> StoreResult<Vec<AdAccount>> {
        let organizations = self.organizations.read().await;
        let ad_accounts = self.ad_accounts.read().await;
        let rows = ad_accounts
            .values()
            .filter(|a| a.team_id == team_id)
            .cloned()
            .map(|mut account| {
                account.organization_name = account
                    .organization_id
                    .and_then(|id| organizations.get(&id))
                    .map(|o| o.name.clone());
                account
            })
            .collect();
        Ok(newest_first(rows, |a: &AdAccount| a.created_at))
    }

    async fn create_ad_accounts(&self, team_id: Uuid, rows: &[AdAccount]) -> StoreResult<()> {
        let organizations = self.organizations.read().await;
        let mut ad_accounts = self.ad_accounts.write().await;
        ensure_new_ids(&ad_accounts, rows.iter().map(|r| r.id))?;
        for row in rows {
            if let Some(org) = row.organization_id {
                check_organization(&organizations, team_id, org, AssetType::AdAccount)?;
            }
        }
        for row in rows {
            let mut row = row.clone();
            row.team_id = team_id;
            row.organization_name = None;
            ad_accounts.insert(row.id, row);
        }
        Ok(())
    }

    async fn update_ad_accounts(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &AdAccountPatch,
    ) -> StoreResult<()> {
        let organizations = self.organizations.read().await;
        let mut ad_accounts = self.ad_accounts.write().await;
        if let Some(Some(org)) = patch.organization_id {
            check_organization(&organizations, team_id, org, AssetType::AdAccount)?;
        }
        let targets: Vec<Uuid> = owned_by_team(&ad_accounts, team_id, ids, |a| a.team_id).collect();
        for id in targets {
            if let Some(account) = ad_accounts.get_mut(&id) {
                patch.apply_to(account);
            }
        }
        Ok(())
    }

    async fn delete_ad_accounts(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let mut ad_accounts = self.ad_accounts.write().await;
        let pages = self.pages.read().await;

        let targets: HashSet<Uuid> =
            owned_by_team(&ad_accounts, team_id, ids, |a| a.team_id).collect();
        if let Some(page) = pages
            .values()
            .find(|p| p.current_ad_account_id.is_some_and(|id| targets.contains(&id)))
        {
            return Err(StoreError::referenced(
                AssetType::AdAccount,
                format!("page \"{}\" runs on the ad account", page.name),
            ));
        }

        for id in targets {
            ad_accounts.remove(&id);
        }
        Ok(())
    }

    // ========================================================================
    // Pages
    // ========================================================================

    async fn list_pages(&self, team_id: Uuid) -> StoreResult<Vec<Page>> {
        let profiles = self.profiles.read().await;
        let organizations = self.organizations.read().await;
        let ad_accounts = self.ad_accounts.read().await;
        let pages = self.pages.read().await;
        let team_members = self.team_members.read().await;
        let refs = PageRefs {
            team_id,
            profiles: &profiles,
            organizations: &organizations,
            ad_accounts: &ad_accounts,
            team_members: &team_members,
        };

        let rows = pages
            .values()
            .filter(|p| p.team_id == team_id)
            .cloned()
            .map(|page| refs.resolve(page))
            .collect();
        Ok(newest_first(rows, |p: &Page| p.created_at))
    }

    async fn create_pages(&self, team_id: Uuid, rows: &[Page]) -> StoreResult<()> {
        let profiles = self.profiles.read().await;
        let organizations = self.organizations.read().await;
        let ad_accounts = self.ad_accounts.read().await;
        let mut pages = self.pages.write().await;
        let team_members = self.team_members.read().await;
        let refs = PageRefs {
            team_id,
            profiles: &profiles,
            organizations: &organizations,
            ad_accounts: &ad_accounts,
            team_members: &team_members,
        };

        ensure_new_ids(&pages, rows.iter().map(|r| r.id))?;
        for row in rows {
            refs.check(row)?;
        }
        for row in rows {
            let mut row = row.clone();
            row.team_id = team_id;
            pages.insert(row.id, row);
        }
        Ok(())
    }

    async fn update_pages(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &PagePatch,
    ) -> StoreResult<()> {
        let profiles = self.profiles.read().await;
        let organizations = self.organizations.read().await;
        let ad_accounts = self.ad_accounts.read().await;
        let mut pages = self.pages.write().await;
        let team_members = self.team_members.read().await;
        let refs = PageRefs {
            team_id,
            profiles: &profiles,
            organizations: &organizations,
            ad_accounts: &ad_accounts,
            team_members: &team_members,
        };

        let mut updated = Vec::new();
        for id in owned_by_team(&pages, team_id, ids, |p| p.team_id) {
            if let Some(page) = pages.get(&id) {
                let mut next = page.clone();
                patch.apply_to(&mut next);
                refs.check(&next)?;
                updated.push(next);
            }
        }
        for page in updated {
            pages.insert(page.id, page);
        }
        Ok(())
    }

    async fn delete_pages(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let mut pages = self.pages.write().await;
        let targets: Vec<Uuid> = owned_by_team(&pages, team_id, ids, |p| p.team_id).collect();
        for id in targets {
            pages.remove(&id);
        }
        Ok(())
    }

    // ========================================================================
    // Links
    // ========================================================================

    async fn list_profile_links(
        &self,
        team_id: Uuid,
        profile_id: Option<Uuid>,
    ) -> StoreResult<Vec<ProfileOrganizationLink>> {
        let organizations = self.organizations.read().await;
        let links = self.links.read().await;
        let rows = links
            .values()
            .filter(|l| l.team_id == team_id)
            .filter(|l| profile_id.map_or(true, |p| l.profile_id == p))
            .cloned()
            .map(|mut link| {
                link.organization_name = organizations
                    .get(&link.organization_id)
                    .map(|o| o.name.clone());
                link
            })
            .collect();
        Ok(newest_first(rows, |l: &ProfileOrganizationLink| l.created_at))
    }

    async fn create_profile_link(
        &self,
        team_id: Uuid,
        link: &ProfileOrganizationLink,
    ) -> StoreResult<()> {
        let profiles = self.profiles.read().await;
        let organizations = self.organizations.read().await;
        let mut links = self.links.write().await;

        if !profiles
            .get(&link.profile_id)
            .is_some_and(|p| p.team_id == team_id)
        {
            return Err(StoreError::referenced(
                AssetType::Profile,
                format!("profile {} does not exist", link.profile_id),
            ));
        }
        check_organization(&organizations, team_id, link.organization_id, AssetType::Profile)?;
        ensure_new_ids(&links, [link.id])?;

        let mut row = link.clone();
        row.team_id = team_id;
        row.organization_name = None;
        links.insert(row.id, row);
        Ok(())
    }

    async fn delete_profile_link(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut links = self.links.write().await;
        match links.get(&id) {
            Some(link) if link.team_id == team_id => {
                links.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::not_found("link", id)),
        }
    }

    // ========================================================================
    // Team members
    // ========================================================================

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>> {
        let members = self.team_members.read().await;
        let mut rows: Vec<TeamMember> = members
            .values()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    // ========================================================================
    // Activity log
    // ========================================================================

    async fn append_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()> {
        if self.reject_activity.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("activity log unavailable".to_string()));
        }
        self.activity.write().await.push(entry.clone());
        Ok(())
    }

    async fn query_activity(
        &self,
        team_id: Uuid,
        query: &ActivityQuery,
    ) -> StoreResult<Vec<ActivityLogEntry>> {
        let activity = self.activity.read().await;
        let mut rows: Vec<ActivityLogEntry> = activity
            .iter()
            .filter(|e| e.team_id == team_id && query.matches(e))
            .cloned()
            .collect();
        // Stable: equal timestamps keep reverse insertion order.
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(query.effective_limit());
        Ok(rows)
    }
}
