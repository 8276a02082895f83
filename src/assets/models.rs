//! Asset models and partial-update patches
//!
//! Four independently managed entity types share the desk: profiles (platform
//! logins), organizations (business managers), ad accounts and pages. Every
//! record belongs to exactly one team.

use crate::context::Role;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Core Enums
// ============================================================================

/// The four asset tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Profile,
    Organization,
    AdAccount,
    Page,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::Profile,
        AssetType::Organization,
        AssetType::AdAccount,
        AssetType::Page,
    ];

    /// Human-readable singular label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Organization => "Business manager",
            Self::AdAccount => "Ad account",
            Self::Page => "Page",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Organization => write!(f, "organization"),
            Self::AdAccount => write!(f, "ad_account"),
            Self::Page => write!(f, "page"),
        }
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "profile" | "profiles" => Ok(Self::Profile),
            "organization" | "organizations" | "bm" => Ok(Self::Organization),
            "adaccount" | "adaccounts" => Ok(Self::AdAccount),
            "page" | "pages" => Ok(Self::Page),
            _ => Err(format!("Unknown asset type: {}", s)),
        }
    }
}

/// Lifecycle status of a profile
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    #[default]
    Active,
    UnderReview,
    Blocked,
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::UnderReview => write!(f, "under_review"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl FromStr for ProfileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "under_review" => Ok(Self::UnderReview),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!("Unknown profile status: {}", s)),
        }
    }
}

/// Lifecycle status of an ad account
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdAccountStatus {
    #[default]
    Active,
    Blocked,
}

impl fmt::Display for AdAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl FromStr for AdAccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!("Unknown ad account status: {}", s)),
        }
    }
}

/// Lifecycle status of a page
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    #[default]
    Available,
    InUse,
    Down,
    Restricted,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::InUse => write!(f, "in_use"),
            Self::Down => write!(f, "down"),
            Self::Restricted => write!(f, "restricted"),
        }
    }
}

impl FromStr for PageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "in_use" => Ok(Self::InUse),
            "down" => Ok(Self::Down),
            "restricted" => Ok(Self::Restricted),
            _ => Err(format!("Unknown page status: {}", s)),
        }
    }
}

/// Role a profile holds inside an organization
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    #[default]
    Administrator,
    Advertiser,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Administrator => write!(f, "administrator"),
            Self::Advertiser => write!(f, "advertiser"),
        }
    }
}

impl FromStr for LinkRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administrator" | "admin" => Ok(Self::Administrator),
            "advertiser" => Ok(Self::Advertiser),
            _ => Err(format!("Unknown link role: {}", s)),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A login identity on the ad platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub profile_url: Option<String>,
    pub status: ProfileStatus,
    pub received_at: NaiveDate,
    /// Set iff status is blocked
    pub blocked_at: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A business manager: the ownership container for ad accounts and pages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    /// Numeric identifier on the platform, kept as text
    pub external_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdAccount {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub external_id: Option<String>,
    pub status: AdAccountStatus,
    pub organization_id: Option<Uuid>,
    /// Resolved by the store on list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A content page. The `current_*` fields and `usage_started_on` only carry
/// meaning while the page is in use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub external_id: Option<String>,
    pub status: PageStatus,
    pub origin_organization_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_organization_name: Option<String>,
    pub current_organization_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_organization_name: Option<String>,
    pub current_ad_account_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ad_account_name: Option<String>,
    pub current_manager_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_manager_name: Option<String>,
    pub current_profile_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_profile_name: Option<String>,
    pub usage_started_on: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Page {
    /// Drop every field that only applies while the page is in use.
    pub fn clear_usage(&mut self) {
        self.current_organization_id = None;
        self.current_organization_name = None;
        self.current_ad_account_id = None;
        self.current_ad_account_name = None;
        self.current_manager_id = None;
        self.current_manager_name = None;
        self.current_profile_id = None;
        self.current_profile_name = None;
        self.usage_started_on = None;
    }
}

/// Many-to-many join between profiles and organizations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileOrganizationLink {
    pub id: Uuid,
    pub team_id: Uuid,
    pub profile_id: Uuid,
    pub organization_id: Uuid,
    pub role: LinkRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A member of the team, usable as a page manager. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

/// Reference to one asset of a given type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AssetRef {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
}

impl AssetRef {
    pub fn new(asset_type: AssetType, id: Uuid) -> Self {
        Self { id, asset_type }
    }
}

// ============================================================================
// Patches
// ============================================================================
//
// Sparse partial updates. `None` means "leave untouched"; for nullable columns
// `Some(None)` clears the value. Field names match the entity fields so a
// patch serializes to exactly the set of columns it touches.

/// Keep `null` distinct from "absent" for nullable patch fields.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProfileStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(url) = &self.profile_url {
            profile.profile_url = url.clone();
        }
        if let Some(status) = self.status {
            profile.status = status;
        }
        if let Some(received_at) = self.received_at {
            profile.received_at = received_at;
        }
        if let Some(blocked_at) = self.blocked_at {
            profile.blocked_at = blocked_at;
        }
        if let Some(tags) = &self.tags {
            profile.tags = tags.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrganizationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl OrganizationPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, organization: &mut Organization) {
        if let Some(name) = &self.name {
            organization.name = name.clone();
        }
        if let Some(external_id) = &self.external_id {
            organization.external_id = external_id.clone();
        }
        if let Some(tags) = &self.tags {
            organization.tags = tags.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdAccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdAccountStatus>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl AdAccountPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, account: &mut AdAccount) {
        if let Some(name) = &self.name {
            account.name = name.clone();
        }
        if let Some(external_id) = &self.external_id {
            account.external_id = external_id.clone();
        }
        if let Some(status) = self.status {
            account.status = status;
        }
        if let Some(organization_id) = self.organization_id {
            account.organization_id = organization_id;
            account.organization_name = None;
        }
        if let Some(tags) = &self.tags {
            account.tags = tags.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_organization_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub current_organization_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub current_ad_account_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub current_manager_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub current_profile_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub usage_started_on: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl PagePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Null out every in-use-only column.
    pub fn clear_usage(&mut self) {
        self.current_organization_id = Some(None);
        self.current_ad_account_id = Some(None);
        self.current_manager_id = Some(None);
        self.current_profile_id = Some(None);
        self.usage_started_on = Some(None);
    }

    pub fn apply_to(&self, page: &mut Page) {
        if let Some(name) = &self.name {
            page.name = name.clone();
        }
        if let Some(external_id) = &self.external_id {
            page.external_id = external_id.clone();
        }
        if let Some(status) = self.status {
            page.status = status;
        }
        if let Some(origin) = self.origin_organization_id {
            page.origin_organization_id = origin;
            page.origin_organization_name = None;
        }
        if let Some(id) = self.current_organization_id {
            page.current_organization_id = id;
            page.current_organization_name = None;
        }
        if let Some(id) = self.current_ad_account_id {
            page.current_ad_account_id = id;
            page.current_ad_account_name = None;
        }
        if let Some(id) = self.current_manager_id {
            page.current_manager_id = id;
            page.current_manager_name = None;
        }
        if let Some(id) = self.current_profile_id {
            page.current_profile_id = id;
            page.current_profile_name = None;
        }
        if let Some(date) = self.usage_started_on {
            page.usage_started_on = date;
        }
        if let Some(tags) = &self.tags {
            page.tags = tags.clone();
        }
    }
}

/// A partial update for any of the four asset types
#[derive(Debug, Clone, PartialEq)]
pub enum AssetPatch {
    Profile(ProfilePatch),
    Organization(OrganizationPatch),
    AdAccount(AdAccountPatch),
    Page(PagePatch),
}

impl AssetPatch {
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Profile(_) => AssetType::Profile,
            Self::Organization(_) => AssetType::Organization,
            Self::AdAccount(_) => AssetType::AdAccount,
            Self::Page(_) => AssetType::Page,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Profile(p) => p.is_empty(),
            Self::Organization(p) => p.is_empty(),
            Self::AdAccount(p) => p.is_empty(),
            Self::Page(p) => p.is_empty(),
        }
    }

    /// Parse a `{column: value}` map for `asset_type`. Unknown columns are
    /// rejected; `null` clears a nullable column.
    pub fn from_fields(
        asset_type: AssetType,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::Value::Object(fields);
        let patch = match asset_type {
            AssetType::Profile => Self::Profile(serde_json::from_value(value)?),
            AssetType::Organization => Self::Organization(serde_json::from_value(value)?),
            AssetType::AdAccount => Self::AdAccount(serde_json::from_value(value)?),
            AssetType::Page => Self::Page(serde_json::from_value(value)?),
        };
        Ok(patch)
    }

    /// The columns this patch touches, with their new values.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let value = match self {
            Self::Profile(p) => serde_json::to_value(p),
            Self::Organization(p) => serde_json::to_value(p),
            Self::AdAccount(p) => serde_json::to_value(p),
            Self::Page(p) => serde_json::to_value(p),
        };
        match value {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.to_fields().keys().cloned().collect()
    }

    /// Keep only the columns accepted by `keep`.
    pub fn retain_fields(&self, keep: impl Fn(&str) -> bool) -> Self {
        let mut fields = self.to_fields();
        fields.retain(|name, _| keep(name));
        Self::from_fields(self.asset_type(), fields).unwrap_or_else(|_| self.clone())
    }
}
