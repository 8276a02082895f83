//! Unified asset projection
//!
//! Merges the four independently fetched collections into one list of
//! [`UnifiedAsset`]s, newest first. The projection is pure and carries no
//! identity of its own: it is rebuilt whenever a source collection changes.

use super::models::*;
use crate::activity::labels::status_label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Placeholder for a missing value
pub const EMPTY_PLACEHOLDER: &str = "—";
/// Summary of an organization without a platform identifier
pub const NO_EXTERNAL_ID: &str = "No ID";
/// Summary of an ad account or page without a resolvable organization
pub const NO_ORGANIZATION: &str = "No BM";

/// One source record of any of the four asset types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AssetRecord {
    Profile(Profile),
    Organization(Organization),
    AdAccount(AdAccount),
    Page(Page),
}

impl AssetRecord {
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Profile(_) => AssetType::Profile,
            Self::Organization(_) => AssetType::Organization,
            Self::AdAccount(_) => AssetType::AdAccount,
            Self::Page(_) => AssetType::Page,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Profile(p) => p.id,
            Self::Organization(o) => o.id,
            Self::AdAccount(a) => a.id,
            Self::Page(p) => p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Profile(p) => &p.name,
            Self::Organization(o) => &o.name,
            Self::AdAccount(a) => &a.name,
            Self::Page(p) => &p.name,
        }
    }

    pub fn team_id(&self) -> Uuid {
        match self {
            Self::Profile(p) => p.team_id,
            Self::Organization(o) => o.team_id,
            Self::AdAccount(a) => a.team_id,
            Self::Page(p) => p.team_id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Profile(p) => p.created_at,
            Self::Organization(o) => o.created_at,
            Self::AdAccount(a) => a.created_at,
            Self::Page(p) => p.created_at,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Profile(p) => &p.tags,
            Self::Organization(o) => &o.tags,
            Self::AdAccount(a) => &a.tags,
            Self::Page(p) => &p.tags,
        }
    }

    pub fn status(&self) -> AssetStatus {
        match self {
            Self::Profile(p) => AssetStatus::Profile(p.status),
            Self::Organization(_) => AssetStatus::Organization,
            Self::AdAccount(a) => AssetStatus::AdAccount(a.status),
            Self::Page(p) => AssetStatus::Page(p.status),
        }
    }

    /// The organization this asset resolves to for faceting: itself for an
    /// organization, the owner for an ad account, the origin for a page.
    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            Self::Profile(_) => None,
            Self::Organization(o) => Some(o.id),
            Self::AdAccount(a) => a.organization_id,
            Self::Page(p) => Some(p.origin_organization_id),
        }
    }

    /// Type-specific detail line shown next to the name
    pub fn display_summary(&self) -> String {
        let summary = match self {
            Self::Profile(p) => non_empty(p.email.as_deref()).unwrap_or(EMPTY_PLACEHOLDER),
            Self::Organization(o) => {
                non_empty(o.external_id.as_deref()).unwrap_or(NO_EXTERNAL_ID)
            }
            Self::AdAccount(a) => {
                non_empty(a.organization_name.as_deref()).unwrap_or(NO_ORGANIZATION)
            }
            Self::Page(p) => {
                non_empty(p.origin_organization_name.as_deref()).unwrap_or(NO_ORGANIZATION)
            }
        };
        summary.to_string()
    }

    /// Flat `{field: value}` snapshot, as stored for create and delete audit entries.
    pub fn snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        let value = match self {
            Self::Profile(p) => serde_json::to_value(p),
            Self::Organization(o) => serde_json::to_value(o),
            Self::AdAccount(a) => serde_json::to_value(a),
            Self::Page(p) => serde_json::to_value(p),
        };
        match value {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    pub fn asset_ref(&self) -> AssetRef {
        AssetRef::new(self.asset_type(), self.id())
    }

    /// Apply a patch of the same type in place. Returns `false` (and leaves the
    /// record untouched) on a type mismatch.
    pub fn apply_patch(&mut self, patch: &AssetPatch) -> bool {
        match (self, patch) {
            (Self::Profile(r), AssetPatch::Profile(p)) => p.apply_to(r),
            (Self::Organization(r), AssetPatch::Organization(p)) => p.apply_to(r),
            (Self::AdAccount(r), AssetPatch::AdAccount(p)) => p.apply_to(r),
            (Self::Page(r), AssetPatch::Page(p)) => p.apply_to(r),
            _ => return false,
        }
        true
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Status of an asset, whatever its type. Organizations have no lifecycle of
/// their own and always report `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetStatus {
    Profile(ProfileStatus),
    Organization,
    AdAccount(AdAccountStatus),
    Page(PageStatus),
}

impl AssetStatus {
    /// Wire code, e.g. `in_use`
    pub fn code(&self) -> String {
        match self {
            Self::Profile(s) => s.to_string(),
            Self::Organization => "active".to_string(),
            Self::AdAccount(s) => s.to_string(),
            Self::Page(s) => s.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        status_label(&self.code()).unwrap_or(EMPTY_PLACEHOLDER)
    }
}

impl Serialize for AssetStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

/// Normalized, listable view of one asset
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnifiedAsset {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub status: AssetStatus,
    /// Display label of `status`, e.g. "In use"
    pub status_label: &'static str,
    pub display_summary: String,
    pub original_data: AssetRecord,
    pub created_at: DateTime<Utc>,
}

impl From<AssetRecord> for UnifiedAsset {
    fn from(record: AssetRecord) -> Self {
        Self {
            id: record.id(),
            name: record.name().to_string(),
            asset_type: record.asset_type(),
            status: record.status(),
            status_label: record.status().label(),
            display_summary: record.display_summary(),
            created_at: record.created_at(),
            original_data: record,
        }
    }
}

/// The four source collections. `None` means "not loaded yet".
#[derive(Debug, Clone, Default)]
pub struct AssetCollections {
    pub profiles: Option<Vec<Profile>>,
    pub organizations: Option<Vec<Organization>>,
    pub ad_accounts: Option<Vec<AdAccount>>,
    pub pages: Option<Vec<Page>>,
}

/// Merge all loaded collections into one list, newest first.
///
/// Ties keep their collection order (profiles, organizations, ad accounts,
/// pages), since the sort is stable.
pub fn project_assets(collections: &AssetCollections) -> Vec<UnifiedAsset> {
    let profiles = collections
        .profiles
        .iter()
        .flatten()
        .cloned()
        .map(AssetRecord::Profile);
    let organizations = collections
        .organizations
        .iter()
        .flatten()
        .cloned()
        .map(AssetRecord::Organization);
    let ad_accounts = collections
        .ad_accounts
        .iter()
        .flatten()
        .cloned()
        .map(AssetRecord::AdAccount);
    let pages = collections
        .pages
        .iter()
        .flatten()
        .cloned()
        .map(AssetRecord::Page);

    let mut assets: Vec<UnifiedAsset> = profiles
        .chain(organizations)
        .chain(ad_accounts)
        .chain(pages)
        .map(UnifiedAsset::from)
        .collect();

    assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    assets
}

/// Resolve an asset by id and type in the current projection.
pub fn find_asset(
    assets: &[UnifiedAsset],
    id: Uuid,
    asset_type: AssetType,
) -> Option<&UnifiedAsset> {
    assets
        .iter()
        .find(|a| a.id == id && a.asset_type == asset_type)
}
