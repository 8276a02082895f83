//! Asset Manager - validated create / update / delete over the entity store
//!
//! Every write is paired with activity log entries: one `create` entry per
//! created record, one `update` entry per changed field of each affected row,
//! one `delete` entry per deleted record. Audit appends are best-effort: a
//! failed append is logged and never undoes the write it describes.

use super::batch::{build_records, parse_batch, BatchCreate, CommonSettings, StagedLine};
use super::error::{MutationError, ValidationError};
use super::validation::{check_manager, patch_manager, prepare_update, require_link_target};
use crate::activity::grouping::{display_offset, group_entries, ActivityGroup};
use crate::activity::models::{field_update, ActionType, ActivityLogEntry, ActivityQuery};
use crate::assets::filter::{compute_filtered_assets, FilterCriteria};
use crate::assets::models::*;
use crate::assets::projector::{
    find_asset, project_assets, AssetCollections, AssetRecord, UnifiedAsset,
};
use crate::assets::tags;
use crate::context::TeamContext;
use crate::store::{AssetStore, StoreResult};
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub type MutationResult<T> = Result<T, MutationError>;

/// Multi-record edit. Each type gets its own patch; types without one are
/// left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BulkUpdate {
    pub targets: Vec<AssetRef>,
    pub profile: Option<ProfilePatch>,
    pub organization: Option<OrganizationPatch>,
    pub ad_account: Option<AdAccountPatch>,
    pub page: Option<PagePatch>,
}

impl BulkUpdate {
    pub fn patch_for(&self, asset_type: AssetType) -> Option<AssetPatch> {
        let patch = match asset_type {
            AssetType::Profile => self.profile.clone().map(AssetPatch::Profile),
            AssetType::Organization => self.organization.clone().map(AssetPatch::Organization),
            AssetType::AdAccount => self.ad_account.clone().map(AssetPatch::AdAccount),
            AssetType::Page => self.page.clone().map(AssetPatch::Page),
        };
        patch.filter(|p| !p.is_empty())
    }
}

/// Result of one per-type call inside a bulk operation
#[derive(Debug)]
pub struct TypeOutcome {
    pub asset_type: AssetType,
    pub ids: Vec<Uuid>,
    pub result: MutationResult<()>,
}

impl TypeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error_message(&self) -> Option<String> {
        self.result.as_ref().err().map(MutationError::user_message)
    }
}

/// Outcomes of a bulk operation, one per asset type involved. Every type's
/// call runs to completion regardless of the others.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub outcomes: Vec<TypeOutcome>,
}

impl BulkOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TypeOutcome::is_ok)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TypeOutcome> {
        self.outcomes.iter().filter(|o| o.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TypeOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn outcome(&self, asset_type: AssetType) -> Option<&TypeOutcome> {
        self.outcomes.iter().find(|o| o.asset_type == asset_type)
    }
}

fn group_by_type(targets: &[AssetRef]) -> BTreeMap<AssetType, Vec<Uuid>> {
    let mut groups: BTreeMap<AssetType, Vec<Uuid>> = BTreeMap::new();
    for target in targets {
        let ids = groups.entry(target.asset_type).or_default();
        if !ids.contains(&target.id) {
            ids.push(target.id);
        }
    }
    groups
}

/// Fields whose value differs between two snapshots, in `fields` order.
fn changed_fields(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    fields: &[String],
) -> Vec<(String, Value, Value)> {
    fields
        .iter()
        .filter_map(|field| {
            let old = before.get(field).cloned().unwrap_or(Value::Null);
            let new = after.get(field).cloned().unwrap_or(Value::Null);
            (old != new).then(|| (field.clone(), old, new))
        })
        .collect()
}

/// Manager for asset mutations, reads and the activity timeline
pub struct AssetManager {
    store: Arc<dyn AssetStore>,
    utc_offset_minutes: i32,
    fixed_today: Option<NaiveDate>,
}

impl AssetManager {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self {
            store,
            utc_offset_minutes: 0,
            fixed_today: None,
        }
    }

    /// Offset used for timeline dates and "today" defaults (builder pattern).
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Pin the date used for defaults (builder pattern).
    pub fn with_fixed_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    /// Calendar date used for date defaults
    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| {
            Utc::now()
                .with_timezone(&display_offset(self.utc_offset_minutes))
                .date_naive()
        })
    }

    fn ensure_can_edit(ctx: &TeamContext, action: &'static str) -> MutationResult<()> {
        if ctx.role.can_edit() {
            Ok(())
        } else {
            Err(MutationError::Forbidden {
                role: ctx.role,
                action,
            })
        }
    }

    fn ensure_can_delete(ctx: &TeamContext) -> MutationResult<()> {
        if ctx.role.can_delete() {
            Ok(())
        } else {
            Err(MutationError::Forbidden {
                role: ctx.role,
                action: "delete assets",
            })
        }
    }

    /// Append an audit entry. Failures are logged, never returned.
    async fn record_activity(
        &self,
        ctx: &TeamContext,
        entity: AssetRef,
        action: ActionType,
        changes: Value,
    ) {
        let entry = ActivityLogEntry::new(
            ctx.team_id,
            entity,
            action,
            changes,
            Some(ctx.actor().to_string()),
        );
        if let Err(e) = self.store.append_activity(&entry).await {
            tracing::warn!(
                entity_type = %entity.asset_type,
                entity_id = %entity.id,
                action = %action,
                error = %e,
                "Failed to append activity log entry"
            );
        }
    }

    async fn record_field_updates(
        &self,
        ctx: &TeamContext,
        entity: AssetRef,
        changes: Vec<(String, Value, Value)>,
    ) {
        for (field, old, new) in changes {
            self.record_activity(ctx, entity, ActionType::Update, field_update(&field, old, new))
                .await;
        }
    }

    async fn ensure_manager_in_team(
        &self,
        ctx: &TeamContext,
        manager: Option<Uuid>,
    ) -> MutationResult<()> {
        if manager.is_none() {
            return Ok(());
        }
        let members = self.store.list_team_members(ctx.team_id).await?;
        check_manager(manager, &members)?;
        Ok(())
    }

    // ========================================================================
    // Per-type dispatch
    // ========================================================================

    async fn list_records(
        &self,
        team_id: Uuid,
        asset_type: AssetType,
    ) -> StoreResult<Vec<AssetRecord>> {
        let records = match asset_type {
            AssetType::Profile => self
                .store
                .list_profiles(team_id)
                .await?
                .into_iter()
                .map(AssetRecord::Profile)
                .collect(),
            AssetType::Organization => self
                .store
                .list_organizations(team_id)
                .await?
                .into_iter()
                .map(AssetRecord::Organization)
                .collect(),
            AssetType::AdAccount => self
                .store
                .list_ad_accounts(team_id)
                .await?
                .into_iter()
                .map(AssetRecord::AdAccount)
                .collect(),
            AssetType::Page => self
                .store
                .list_pages(team_id)
                .await?
                .into_iter()
                .map(AssetRecord::Page)
                .collect(),
        };
        Ok(records)
    }

    async fn create_records(
        &self,
        team_id: Uuid,
        asset_type: AssetType,
        records: &[AssetRecord],
    ) -> StoreResult<()> {
        match asset_type {
            AssetType::Profile => {
                let rows: Vec<Profile> = records
                    .iter()
                    .filter_map(|r| match r {
                        AssetRecord::Profile(p) => Some(p.clone()),
                        _ => None,
                    })
                    .collect();
                self.store.create_profiles(team_id, &rows).await
            }
            AssetType::Organization => {
                let rows: Vec<Organization> = records
                    .iter()
                    .filter_map(|r| match r {
                        AssetRecord::Organization(o) => Some(o.clone()),
                        _ => None,
                    })
                    .collect();
                self.store.create_organizations(team_id, &rows).await
            }
            AssetType::AdAccount => {
                let rows: Vec<AdAccount> = records
                    .iter()
                    .filter_map(|r| match r {
                        AssetRecord::AdAccount(a) => Some(a.clone()),
                        _ => None,
                    })
                    .collect();
                self.store.create_ad_accounts(team_id, &rows).await
            }
            AssetType::Page => {
                let rows: Vec<Page> = records
                    .iter()
                    .filter_map(|r| match r {
                        AssetRecord::Page(p) => Some(p.clone()),
                        _ => None,
                    })
                    .collect();
                self.store.create_pages(team_id, &rows).await
            }
        }
    }

    async fn update_records(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &AssetPatch,
    ) -> StoreResult<()> {
        match patch {
            AssetPatch::Profile(p) => self.store.update_profiles(team_id, ids, p).await,
            AssetPatch::Organization(p) => self.store.update_organizations(team_id, ids, p).await,
            AssetPatch::AdAccount(p) => self.store.update_ad_accounts(team_id, ids, p).await,
            AssetPatch::Page(p) => self.store.update_pages(team_id, ids, p).await,
        }
    }

    async fn delete_records(
        &self,
        team_id: Uuid,
        asset_type: AssetType,
        ids: &[Uuid],
    ) -> StoreResult<()> {
        match asset_type {
            AssetType::Profile => self.store.delete_profiles(team_id, ids).await,
            AssetType::Organization => self.store.delete_organizations(team_id, ids).await,
            AssetType::AdAccount => self.store.delete_ad_accounts(team_id, ids).await,
            AssetType::Page => self.store.delete_pages(team_id, ids).await,
        }
    }

    async fn fetch_record(
        &self,
        ctx: &TeamContext,
        target: AssetRef,
    ) -> MutationResult<AssetRecord> {
        self.list_records(ctx.team_id, target.asset_type)
            .await?
            .into_iter()
            .find(|r| r.id() == target.id)
            .ok_or_else(|| MutationError::not_found(target.asset_type, target.id))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch the four collections concurrently.
    pub async fn load_collections(&self, ctx: &TeamContext) -> MutationResult<AssetCollections> {
        let team = ctx.team_id;
        let (profiles, organizations, ad_accounts, pages) = tokio::try_join!(
            self.store.list_profiles(team),
            self.store.list_organizations(team),
            self.store.list_ad_accounts(team),
            self.store.list_pages(team),
        )?;
        Ok(AssetCollections {
            profiles: Some(profiles),
            organizations: Some(organizations),
            ad_accounts: Some(ad_accounts),
            pages: Some(pages),
        })
    }

    /// Project every collection and narrow it with `criteria`.
    pub async fn list_assets(
        &self,
        ctx: &TeamContext,
        criteria: &FilterCriteria,
    ) -> MutationResult<Vec<UnifiedAsset>> {
        let collections = self.load_collections(ctx).await?;
        let all = project_assets(&collections);
        Ok(compute_filtered_assets(&all, criteria))
    }

    /// Resolve one asset against a fresh projection.
    pub async fn get_asset(
        &self,
        ctx: &TeamContext,
        asset_type: AssetType,
        id: Uuid,
    ) -> MutationResult<UnifiedAsset> {
        let records = self.list_records(ctx.team_id, asset_type).await?;
        let projected: Vec<UnifiedAsset> = records.into_iter().map(UnifiedAsset::from).collect();
        find_asset(&projected, id, asset_type)
            .cloned()
            .ok_or_else(|| MutationError::not_found(asset_type, id))
    }

    pub async fn list_team_members(&self, ctx: &TeamContext) -> MutationResult<Vec<TeamMember>> {
        Ok(self.store.list_team_members(ctx.team_id).await?)
    }

    pub async fn list_profile_links(
        &self,
        ctx: &TeamContext,
        profile_id: Uuid,
    ) -> MutationResult<Vec<ProfileOrganizationLink>> {
        Ok(self.store.list_profile_links(ctx.team_id, Some(profile_id)).await?)
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Create one record per staged line with the shared settings.
    pub async fn create_batch(
        &self,
        ctx: &TeamContext,
        batch: &BatchCreate,
    ) -> MutationResult<Vec<AssetRecord>> {
        Self::ensure_can_edit(ctx, "create assets")?;
        let lines = parse_batch(&batch.lines);
        self.create_staged(ctx, &lines, &batch.settings).await
    }

    /// Create a single record. The name and secondary value are taken as
    /// given (trimmed), with no line or comma splitting.
    pub async fn create_asset(
        &self,
        ctx: &TeamContext,
        name: &str,
        secondary: Option<&str>,
        settings: CommonSettings,
    ) -> MutationResult<AssetRecord> {
        Self::ensure_can_edit(ctx, "create assets")?;
        let line = StagedLine {
            name: name.trim().to_string(),
            secondary: secondary
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        let mut created = self.create_staged(ctx, &[line], &settings).await?;
        created
            .pop()
            .ok_or_else(|| ValidationError::NoBatchLines.into())
    }

    async fn create_staged(
        &self,
        ctx: &TeamContext,
        lines: &[StagedLine],
        settings: &CommonSettings,
    ) -> MutationResult<Vec<AssetRecord>> {
        if lines.is_empty() {
            return Err(ValidationError::NoBatchLines.into());
        }
        self.ensure_manager_in_team(ctx, settings.current_manager_id())
            .await?;

        let records = build_records(lines, settings, ctx, self.today())?;
        let asset_type = settings.asset_type();
        self.create_records(ctx.team_id, asset_type, &records).await?;

        tracing::info!(
            team_id = %ctx.team_id,
            asset_type = %asset_type,
            count = records.len(),
            "Created assets"
        );

        for record in &records {
            self.record_activity(
                ctx,
                record.asset_ref(),
                ActionType::Create,
                Value::Object(record.snapshot()),
            )
            .await;
            if let AssetRecord::Page(page) = record {
                self.notify_page_linked(ctx, page).await;
            }
        }

        Ok(records)
    }

    /// Note on the organizations and ad account a new page points at.
    async fn notify_page_linked(&self, ctx: &TeamContext, page: &Page) {
        let change = field_update("linked_page", Value::Null, json!(page.name));
        let mut organizations = vec![page.origin_organization_id];
        if let Some(current) = page.current_organization_id {
            if current != page.origin_organization_id {
                organizations.push(current);
            }
        }
        for org in organizations {
            self.record_activity(
                ctx,
                AssetRef::new(AssetType::Organization, org),
                ActionType::Update,
                change.clone(),
            )
            .await;
        }
        if let Some(account) = page.current_ad_account_id {
            self.record_activity(
                ctx,
                AssetRef::new(AssetType::AdAccount, account),
                ActionType::Update,
                change.clone(),
            )
            .await;
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Edit one record. Writes only the fields that actually change and logs
    /// one update entry per explicitly edited field that changed. Derived
    /// changes (default dates, cleared usage columns) are written but not logged.
    pub async fn update_fields(
        &self,
        ctx: &TeamContext,
        target: AssetRef,
        patch: &AssetPatch,
    ) -> MutationResult<AssetRecord> {
        Self::ensure_can_edit(ctx, "edit assets")?;
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }

        let current = self.fetch_record(ctx, target).await?;
        let prepared = prepare_update(patch, &current, self.today())?;
        self.ensure_manager_in_team(ctx, patch_manager(&prepared)).await?;

        let mut after = current.clone();
        after.apply_patch(&prepared);
        let before_snapshot = current.snapshot();
        let after_snapshot = after.snapshot();

        let written = changed_fields(&before_snapshot, &after_snapshot, &prepared.field_names());
        if written.is_empty() {
            return Ok(current);
        }
        let written_names: Vec<&str> = written.iter().map(|(f, _, _)| f.as_str()).collect();
        let to_write = prepared.retain_fields(|f| written_names.contains(&f));

        self.update_records(ctx.team_id, &[target.id], &to_write).await?;

        let explicit = patch.field_names();
        let audited: Vec<(String, Value, Value)> = written
            .into_iter()
            .filter(|(field, _, _)| explicit.contains(field))
            .collect();
        self.record_field_updates(ctx, target, audited).await;

        match self.fetch_record(ctx, target).await {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                tracing::warn!(id = %target.id, error = %e, "Failed to re-read updated asset");
                Ok(after)
            }
        }
    }

    /// Edit one field of one record, e.g. a status change from a detail view.
    pub async fn update_field(
        &self,
        ctx: &TeamContext,
        target: AssetRef,
        field: &str,
        value: Value,
    ) -> MutationResult<AssetRecord> {
        let mut fields = Map::new();
        fields.insert(field.to_string(), value);
        let patch = super::validation::parse_patch(target.asset_type, fields)?;
        self.update_fields(ctx, target, &patch).await
    }

    /// Apply each type's patch to every selected id of that type. Types run
    /// concurrently and independently.
    pub async fn bulk_update(
        &self,
        ctx: &TeamContext,
        request: &BulkUpdate,
    ) -> MutationResult<BulkOutcome> {
        Self::ensure_can_edit(ctx, "edit assets")?;
        if request.targets.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        let groups: Vec<(AssetType, Vec<Uuid>, AssetPatch)> = group_by_type(&request.targets)
            .into_iter()
            .filter_map(|(asset_type, ids)| {
                request
                    .patch_for(asset_type)
                    .map(|patch| (asset_type, ids, patch))
            })
            .collect();
        if groups.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        for (_, _, patch) in &groups {
            self.ensure_manager_in_team(ctx, patch_manager(patch)).await?;
        }

        let futures = groups
            .into_iter()
            .map(|(asset_type, ids, patch)| self.bulk_update_type(ctx, asset_type, ids, patch));
        let outcomes = join_all(futures).await;

        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                tracing::warn!(
                    asset_type = %outcome.asset_type,
                    count = outcome.ids.len(),
                    error = %e,
                    "Bulk update failed"
                );
            }
        }
        Ok(BulkOutcome { outcomes })
    }

    async fn bulk_update_type(
        &self,
        ctx: &TeamContext,
        asset_type: AssetType,
        ids: Vec<Uuid>,
        patch: AssetPatch,
    ) -> TypeOutcome {
        let result = self.try_bulk_update_type(ctx, asset_type, &ids, &patch).await;
        TypeOutcome {
            asset_type,
            ids,
            result,
        }
    }

    async fn try_bulk_update_type(
        &self,
        ctx: &TeamContext,
        asset_type: AssetType,
        ids: &[Uuid],
        patch: &AssetPatch,
    ) -> MutationResult<()> {
        let today = self.today();
        let current: Vec<AssetRecord> = self
            .list_records(ctx.team_id, asset_type)
            .await?
            .into_iter()
            .filter(|r| ids.contains(&r.id()))
            .collect();
        if let Some(missing) = ids.iter().find(|id| !current.iter().any(|r| r.id() == **id)) {
            return Err(MutationError::not_found(asset_type, *missing));
        }

        // Rows needing the same derived columns share one write.
        let mut writes: Vec<(AssetPatch, Vec<&AssetRecord>)> = Vec::new();
        for record in &current {
            let prepared = prepare_update(patch, record, today)?;
            match writes.iter_mut().find(|(p, _)| *p == prepared) {
                Some((_, rows)) => rows.push(record),
                None => writes.push((prepared, vec![record])),
            }
        }

        let explicit = patch.field_names();
        for (prepared, rows) in writes {
            let row_ids: Vec<Uuid> = rows.iter().map(|r| r.id()).collect();
            self.update_records(ctx.team_id, &row_ids, &prepared).await?;

            for record in rows {
                let mut after = record.clone();
                after.apply_patch(&prepared);
                let changes = changed_fields(&record.snapshot(), &after.snapshot(), &explicit);
                self.record_field_updates(ctx, record.asset_ref(), changes).await;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Add a tag, rejecting case-insensitive duplicates. Returns the new tag list.
    pub async fn add_tag(
        &self,
        ctx: &TeamContext,
        target: AssetRef,
        tag: &str,
    ) -> MutationResult<Vec<String>> {
        Self::ensure_can_edit(ctx, "tag assets")?;
        let current = self.fetch_record(ctx, target).await?;
        let next = tags::add_tag(current.tags(), tag).map_err(ValidationError::from)?;
        self.write_tags(ctx, &current, next).await
    }

    /// Remove a tag (exact match). Removing an absent tag is a no-op.
    pub async fn remove_tag(
        &self,
        ctx: &TeamContext,
        target: AssetRef,
        tag: &str,
    ) -> MutationResult<Vec<String>> {
        Self::ensure_can_edit(ctx, "tag assets")?;
        let current = self.fetch_record(ctx, target).await?;
        let next = tags::remove_tag(current.tags(), tag);
        if next.len() == current.tags().len() {
            return Ok(next);
        }
        self.write_tags(ctx, &current, next).await
    }

    async fn write_tags(
        &self,
        ctx: &TeamContext,
        current: &AssetRecord,
        next: Vec<String>,
    ) -> MutationResult<Vec<String>> {
        let patch = match current {
            AssetRecord::Profile(_) => AssetPatch::Profile(ProfilePatch {
                tags: Some(next.clone()),
                ..Default::default()
            }),
            AssetRecord::Organization(_) => AssetPatch::Organization(OrganizationPatch {
                tags: Some(next.clone()),
                ..Default::default()
            }),
            AssetRecord::AdAccount(_) => AssetPatch::AdAccount(AdAccountPatch {
                tags: Some(next.clone()),
                ..Default::default()
            }),
            AssetRecord::Page(_) => AssetPatch::Page(PagePatch {
                tags: Some(next.clone()),
                ..Default::default()
            }),
        };
        self.update_records(ctx.team_id, &[current.id()], &patch).await?;
        self.record_activity(
            ctx,
            current.asset_ref(),
            ActionType::Update,
            field_update("tags", json!(current.tags()), json!(next)),
        )
        .await;
        Ok(next)
    }

    // ========================================================================
    // Profile links
    // ========================================================================

    /// Link a profile to an organization with a role.
    pub async fn link_profile(
        &self,
        ctx: &TeamContext,
        profile_id: Uuid,
        organization_id: Option<Uuid>,
        role: LinkRole,
    ) -> MutationResult<ProfileOrganizationLink> {
        Self::ensure_can_edit(ctx, "link profiles")?;
        let organization_id = require_link_target(organization_id)?;

        let existing = self.store.list_profile_links(ctx.team_id, Some(profile_id)).await?;
        if existing
            .iter()
            .any(|l| l.organization_id == organization_id && l.role == role)
        {
            return Err(ValidationError::DuplicateLink(role).into());
        }

        let link = ProfileOrganizationLink {
            id: Uuid::new_v4(),
            team_id: ctx.team_id,
            profile_id,
            organization_id,
            role,
            organization_name: None,
            created_at: Utc::now(),
        };
        self.store.create_profile_link(ctx.team_id, &link).await?;

        let after = self.store.list_profile_links(ctx.team_id, Some(profile_id)).await;
        let after = match after {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(
                    profile_id = %profile_id,
                    error = %e,
                    "Failed to re-read profile links"
                );
                let mut links = existing.clone();
                links.push(link.clone());
                links
            }
        };
        self.record_activity(
            ctx,
            AssetRef::new(AssetType::Profile, profile_id),
            ActionType::Update,
            field_update("organizations", link_summary(&existing), link_summary(&after)),
        )
        .await;

        let created = after.into_iter().find(|l| l.id == link.id).unwrap_or(link);
        Ok(created)
    }

    pub async fn unlink_profile(&self, ctx: &TeamContext, link_id: Uuid) -> MutationResult<()> {
        Self::ensure_can_edit(ctx, "link profiles")?;
        let links = self.store.list_profile_links(ctx.team_id, None).await?;
        let link = links
            .iter()
            .find(|l| l.id == link_id)
            .cloned()
            .ok_or_else(|| MutationError::NotFound {
                entity: "link".to_string(),
                id: link_id,
            })?;
        let before: Vec<ProfileOrganizationLink> = links
            .into_iter()
            .filter(|l| l.profile_id == link.profile_id)
            .collect();

        self.store.delete_profile_link(ctx.team_id, link_id).await?;

        let after: Vec<ProfileOrganizationLink> = before
            .iter()
            .filter(|l| l.id != link_id)
            .cloned()
            .collect();
        self.record_activity(
            ctx,
            AssetRef::new(AssetType::Profile, link.profile_id),
            ActionType::Update,
            field_update("organizations", link_summary(&before), link_summary(&after)),
        )
        .await;
        Ok(())
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Delete the selection, one store call per asset type. A failing type
    /// never rolls back the others.
    pub async fn delete_assets(
        &self,
        ctx: &TeamContext,
        targets: &[AssetRef],
    ) -> MutationResult<BulkOutcome> {
        Self::ensure_can_delete(ctx)?;
        if targets.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        let futures = group_by_type(targets)
            .into_iter()
            .map(|(asset_type, ids)| self.delete_type(ctx, asset_type, ids));
        let outcomes = join_all(futures).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => tracing::info!(
                    asset_type = %outcome.asset_type,
                    count = outcome.ids.len(),
                    "Deleted assets"
                ),
                Err(e) => tracing::warn!(
                    asset_type = %outcome.asset_type,
                    count = outcome.ids.len(),
                    error = %e,
                    "Delete failed"
                ),
            }
        }
        Ok(BulkOutcome { outcomes })
    }

    /// Delete one asset.
    pub async fn delete_asset(&self, ctx: &TeamContext, target: AssetRef) -> MutationResult<()> {
        let mut outcome = self.delete_assets(ctx, &[target]).await?;
        match outcome.outcomes.pop() {
            Some(o) => o.result,
            None => Ok(()),
        }
    }

    async fn delete_type(
        &self,
        ctx: &TeamContext,
        asset_type: AssetType,
        ids: Vec<Uuid>,
    ) -> TypeOutcome {
        // Snapshots for the audit trail; a failed read only loses detail.
        let listed = self.list_records(ctx.team_id, asset_type).await;
        let snapshots: BTreeMap<Uuid, Map<String, Value>> = match listed {
            Ok(records) => records
                .into_iter()
                .filter(|r| ids.contains(&r.id()))
                .map(|r| (r.id(), r.snapshot()))
                .collect(),
            Err(e) => {
                tracing::warn!(
                    asset_type = %asset_type,
                    error = %e,
                    "Failed to snapshot assets before delete"
                );
                BTreeMap::new()
            }
        };

        let result = self
            .delete_records(ctx.team_id, asset_type, &ids)
            .await
            .map_err(MutationError::from);

        if result.is_ok() {
            for id in &ids {
                let snapshot = snapshots.get(id).cloned().unwrap_or_default();
                self.record_activity(
                    ctx,
                    AssetRef::new(asset_type, *id),
                    ActionType::Delete,
                    Value::Object(snapshot),
                )
                .await;
            }
        }

        TypeOutcome {
            asset_type,
            ids,
            result,
        }
    }

    // ========================================================================
    // Activity
    // ========================================================================

    /// Raw entries, newest first, capped at 50.
    pub async fn activity(
        &self,
        ctx: &TeamContext,
        query: &ActivityQuery,
    ) -> MutationResult<Vec<ActivityLogEntry>> {
        Ok(self.store.query_activity(ctx.team_id, query).await?)
    }

    /// Entries grouped by actor and minute, each with its rendered lines.
    pub async fn activity_timeline(
        &self,
        ctx: &TeamContext,
        query: &ActivityQuery,
    ) -> MutationResult<Vec<ActivityGroup>> {
        let entries = self.activity(ctx, query).await?;
        Ok(group_entries(entries, display_offset(self.utc_offset_minutes)))
    }
}

/// `["BM name (role)", ...]` for a profile's links, used in link audit entries.
fn link_summary(links: &[ProfileOrganizationLink]) -> Value {
    let mut names: Vec<String> = links
        .iter()
        .map(|l| {
            let org = l
                .organization_name
                .clone()
                .unwrap_or_else(|| l.organization_id.to_string());
            format!("{} ({})", org, l.role)
        })
        .collect();
    names.sort();
    json!(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::store::MemoryStore;
    use crate::test_helpers::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, AssetManager, TeamContext) {
        let store = Arc::new(MemoryStore::new());
        let manager = AssetManager::new(store.clone()).with_fixed_today(today());
        let ctx = test_context(Role::Admin);
        (store, manager, ctx)
    }

    async fn org(manager: &AssetManager, ctx: &TeamContext, name: &str) -> Organization {
        let record = manager
            .create_asset(
                ctx,
                name,
                None,
                CommonSettings::Organization(Default::default()),
            )
            .await
            .unwrap();
        let AssetRecord::Organization(org) = record else {
            panic!("expected organization")
        };
        org
    }

    #[tokio::test]
    async fn test_batch_create_logs_one_entry_per_record() {
        let (store, manager, ctx) = setup();
        let batch = BatchCreate {
            lines: "Ana, ana@x.com\n\nBruno\n, nobody".into(),
            settings: CommonSettings::Profile(Default::default()),
        };
        let created = manager.create_batch(&ctx, &batch).await.unwrap();
        assert_eq!(created.len(), 2);

        let log = store.activity.read().await;
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.action_type == ActionType::Create));
        assert!(log.iter().all(|e| e.actor_name.as_deref() == Some("Test User")));
    }

    #[tokio::test]
    async fn test_page_batch_notifies_linked_organization() {
        let (store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "BM").await;
        let batch = BatchCreate {
            lines: "Page 1\nPage 2".into(),
            settings: CommonSettings::Page(super::super::batch::PageSettings {
                origin_organization_id: Some(bm.id),
                ..Default::default()
            }),
        };
        manager.create_batch(&ctx, &batch).await.unwrap();

        let org_entries = store
            .query_activity(
                ctx.team_id,
                &ActivityQuery::for_entity(AssetRef::new(AssetType::Organization, bm.id)),
            )
            .await
            .unwrap();
        // One create plus one "linked page" note per page.
        assert_eq!(org_entries.len(), 3);
        assert_eq!(
            org_entries
                .iter()
                .filter(|e| e.action_type == ActionType::Update)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_empty_batch_never_reaches_store() {
        let (store, manager, ctx) = setup();
        let err = manager
            .create_batch(
                &ctx,
                &BatchCreate {
                    lines: "  \n".into(),
                    settings: CommonSettings::Organization(Default::default()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Validation(ValidationError::NoBatchLines)));
        assert!(store.organizations.read().await.is_empty());
        assert!(store.activity.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_single_create_keeps_commas_and_newlines_in_name() {
        let (store, manager, ctx) = setup();
        let acme = org(&manager, &ctx, "Acme, Inc").await;
        assert_eq!(acme.name, "Acme, Inc");

        let multi = org(&manager, &ctx, "  First\nSecond  ").await;
        assert_eq!(multi.name, "First\nSecond");
        assert_eq!(store.organizations.read().await.len(), 2);
        assert_eq!(store.activity.read().await.len(), 2);

        let err = manager
            .create_asset(&ctx, "   ", None, CommonSettings::Organization(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bulk_update_reports_ids_outside_team_as_not_found() {
        let (store, manager, ctx) = setup();
        let mine = org(&manager, &ctx, "Mine").await;
        let other_team = test_context(Role::Admin);
        let theirs = org(&manager, &other_team, "Theirs").await;
        store.activity.write().await.clear();

        let outcome = manager
            .bulk_update(
                &ctx,
                &BulkUpdate {
                    targets: vec![
                        AssetRef::new(AssetType::Organization, mine.id),
                        AssetRef::new(AssetType::Organization, theirs.id),
                    ],
                    organization: Some(OrganizationPatch {
                        name: Some("Renamed".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!outcome.all_succeeded());
        let failed = outcome.outcome(AssetType::Organization).unwrap();
        assert!(matches!(failed.result, Err(MutationError::NotFound { .. })));
        let organizations = store.organizations.read().await;
        assert_eq!(organizations[&mine.id].name, "Mine");
        assert_eq!(organizations[&theirs.id].name, "Theirs");
        assert!(store.activity.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_update_writes_blocked_date_but_logs_status_only() {
        let (store, manager, ctx) = setup();
        let record = manager
            .create_asset(&ctx, "P", None, CommonSettings::Profile(Default::default()))
            .await
            .unwrap();
        let target = record.asset_ref();
        store.activity.write().await.clear();

        let updated = manager
            .update_field(&ctx, target, "status", json!("blocked"))
            .await
            .unwrap();
        let AssetRecord::Profile(profile) = updated else {
            panic!("expected profile")
        };
        assert_eq!(profile.status, ProfileStatus::Blocked);
        assert_eq!(profile.blocked_at, Some(today()));

        let log = store.activity.read().await;
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].changes,
            json!({"status": {"old": "active", "new": "blocked"}})
        );
    }

    #[tokio::test]
    async fn test_unchanged_field_is_neither_written_nor_logged() {
        let (store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "Same").await;
        store.activity.write().await.clear();

        manager
            .update_field(
                &ctx,
                AssetRef::new(AssetType::Organization, bm.id),
                "name",
                json!("Same"),
            )
            .await
            .unwrap();
        assert!(store.activity.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_writes_no_audit() {
        let (store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "BM").await;
        let record = manager
            .create_asset(
                &ctx,
                "Acc",
                None,
                CommonSettings::AdAccount(super::super::batch::AdAccountSettings {
                    organization_id: Some(bm.id),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        store.activity.write().await.clear();

        let err = manager
            .update_field(&ctx, record.asset_ref(), "organization_id", json!(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::ReferentialIntegrity { .. }));
        assert!(store.activity.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_write() {
        let (store, manager, ctx) = setup();
        store.reject_activity_appends(true);
        let bm = org(&manager, &ctx, "BM").await;
        assert_eq!(store.list_organizations(ctx.team_id).await.unwrap()[0].id, bm.id);
    }

    #[tokio::test]
    async fn test_tags_case_insensitive_and_logged() {
        let (store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "BM").await;
        let target = AssetRef::new(AssetType::Organization, bm.id);
        store.activity.write().await.clear();

        let tags = manager.add_tag(&ctx, target, "Premium").await.unwrap();
        assert_eq!(tags, vec!["Premium".to_string()]);

        let err = manager.add_tag(&ctx, target, "premium").await.unwrap_err();
        assert!(matches!(err, MutationError::Validation(ValidationError::Tag(_))));

        let tags = manager.remove_tag(&ctx, target, "Premium").await.unwrap();
        assert!(tags.is_empty());

        let log = store.activity.read().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].changes["tags"]["new"], json!(["Premium"]));
    }

    #[tokio::test]
    async fn test_viewer_is_read_only_and_member_cannot_delete() {
        let (_store, manager, admin) = setup();
        let bm = org(&manager, &admin, "BM").await;

        let viewer = TeamContext::new(Uuid::new_v4(), admin.team_id, Role::Viewer);
        let err = manager
            .create_asset(&viewer, "x", None, CommonSettings::Organization(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Forbidden { .. }));
        let visible = manager
            .list_assets(&viewer, &FilterCriteria::default())
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);

        let member = TeamContext::new(Uuid::new_v4(), admin.team_id, Role::Member);
        let err = manager
            .delete_asset(&member, AssetRef::new(AssetType::Organization, bm.id))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_link_profile_rules() {
        let (store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "BM").await;
        let profile = manager
            .create_asset(&ctx, "P", None, CommonSettings::Profile(Default::default()))
            .await
            .unwrap();
        store.activity.write().await.clear();

        let err = manager
            .link_profile(&ctx, profile.id(), None, LinkRole::Administrator)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Validation(ValidationError::MissingField { .. })
        ));

        let link = manager
            .link_profile(&ctx, profile.id(), Some(bm.id), LinkRole::Administrator)
            .await
            .unwrap();
        assert_eq!(link.organization_name.as_deref(), Some("BM"));

        let err = manager
            .link_profile(&ctx, profile.id(), Some(bm.id), LinkRole::Administrator)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Validation(ValidationError::DuplicateLink(_))
        ));

        manager.unlink_profile(&ctx, link.id).await.unwrap();

        let log = store.activity.read().await;
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[0].changes,
            json!({"organizations": {"old": [], "new": ["BM (administrator)"]}})
        );
        assert_eq!(log[1].changes["organizations"]["new"], json!([]));
    }

    #[tokio::test]
    async fn test_manager_outside_team_rejected() {
        let (_store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "BM").await;
        let err = manager
            .create_asset(
                &ctx,
                "Page",
                None,
                CommonSettings::Page(super::super::batch::PageSettings {
                    status: PageStatus::InUse,
                    origin_organization_id: Some(bm.id),
                    current_manager_id: Some(Uuid::new_v4()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Validation(ValidationError::ManagerNotInTeam(_))
        ));
    }

    #[tokio::test]
    async fn test_get_asset_reflects_latest_state() {
        let (_store, manager, ctx) = setup();
        let bm = org(&manager, &ctx, "Before").await;
        manager
            .update_field(
                &ctx,
                AssetRef::new(AssetType::Organization, bm.id),
                "name",
                json!("After"),
            )
            .await
            .unwrap();
        let asset = manager.get_asset(&ctx, AssetType::Organization, bm.id).await.unwrap();
        assert_eq!(asset.name, "After");
        assert!(matches!(
            manager.get_asset(&ctx, AssetType::Page, bm.id).await,
            Err(MutationError::NotFound { .. })
        ));
    }
}
