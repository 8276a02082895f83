//! Staged batch creation
//!
//! Operators paste one record per line as `name[, secondary]`. The secondary
//! value is the login email for profiles and the platform id for every other
//! type. Settings shared by the whole batch come alongside the lines.

use super::error::ValidationError;
use super::validation::{normalize_new_page, normalize_new_profile, require_name};
use crate::assets::models::*;
use crate::assets::projector::AssetRecord;
use crate::assets::tags::normalize_tags;
use crate::context::TeamContext;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLine {
    pub name: String,
    pub secondary: Option<String>,
}

/// Parse newline-delimited input, dropping blank lines and lines with no name.
pub fn parse_batch(input: &str) -> Vec<StagedLine> {
    input
        .lines()
        .filter_map(|line| {
            let (name, secondary) = match line.split_once(',') {
                Some((name, rest)) => (name.trim(), Some(rest.trim())),
                None => (line.trim(), None),
            };
            if name.is_empty() {
                return None;
            }
            Some(StagedLine {
                name: name.to_string(),
                secondary: secondary.filter(|s| !s.is_empty()).map(str::to_string),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileSettings {
    pub status: ProfileStatus,
    /// Defaults to today
    pub received_at: Option<NaiveDate>,
    pub blocked_at: Option<NaiveDate>,
    pub profile_url: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrganizationSettings {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdAccountSettings {
    pub status: AdAccountStatus,
    pub organization_id: Option<Uuid>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageSettings {
    pub status: PageStatus,
    /// Required
    pub origin_organization_id: Option<Uuid>,
    pub current_organization_id: Option<Uuid>,
    pub current_ad_account_id: Option<Uuid>,
    pub current_manager_id: Option<Uuid>,
    pub current_profile_id: Option<Uuid>,
    pub usage_started_on: Option<NaiveDate>,
    pub tags: Vec<String>,
}

/// Settings applied to every record of a batch; the variant picks the type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommonSettings {
    Profile(ProfileSettings),
    Organization(OrganizationSettings),
    AdAccount(AdAccountSettings),
    Page(PageSettings),
}

impl CommonSettings {
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Profile(_) => AssetType::Profile,
            Self::Organization(_) => AssetType::Organization,
            Self::AdAccount(_) => AssetType::AdAccount,
            Self::Page(_) => AssetType::Page,
        }
    }

    pub fn current_manager_id(&self) -> Option<Uuid> {
        match self {
            Self::Page(settings) => settings.current_manager_id,
            _ => None,
        }
    }
}

/// A batch create request: raw lines plus shared settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchCreate {
    pub lines: String,
    pub settings: CommonSettings,
}

/// Build one record per staged line, applying the shared settings.
pub fn build_records(
    lines: &[StagedLine],
    settings: &CommonSettings,
    ctx: &TeamContext,
    today: NaiveDate,
) -> Result<Vec<AssetRecord>, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::NoBatchLines);
    }
    for line in lines {
        require_name(&line.name)?;
    }

    let now = Utc::now();
    let created_by = Some(ctx.user_id);

    let records = match settings {
        CommonSettings::Profile(s) => {
            let tags = normalize_tags(&s.tags);
            lines
                .iter()
                .map(|line| {
                    let mut profile = Profile {
                        id: Uuid::new_v4(),
                        team_id: ctx.team_id,
                        name: line.name.clone(),
                        email: line.secondary.clone(),
                        profile_url: s.profile_url.clone(),
                        status: s.status,
                        received_at: s.received_at.unwrap_or(today),
                        blocked_at: s.blocked_at,
                        tags: tags.clone(),
                        created_by,
                        created_at: now,
                    };
                    normalize_new_profile(&mut profile, today);
                    AssetRecord::Profile(profile)
                })
                .collect()
        }
        CommonSettings::Organization(s) => {
            let tags = normalize_tags(&s.tags);
            lines
                .iter()
                .map(|line| {
                    AssetRecord::Organization(Organization {
                        id: Uuid::new_v4(),
                        team_id: ctx.team_id,
                        name: line.name.clone(),
                        external_id: line.secondary.clone(),
                        tags: tags.clone(),
                        created_by,
                        created_at: now,
                    })
                })
                .collect()
        }
        CommonSettings::AdAccount(s) => {
            let tags = normalize_tags(&s.tags);
            lines
                .iter()
                .map(|line| {
                    AssetRecord::AdAccount(AdAccount {
                        id: Uuid::new_v4(),
                        team_id: ctx.team_id,
                        name: line.name.clone(),
                        external_id: line.secondary.clone(),
                        status: s.status,
                        organization_id: s.organization_id,
                        organization_name: None,
                        tags: tags.clone(),
                        created_by,
                        created_at: now,
                    })
                })
                .collect()
        }
        CommonSettings::Page(s) => {
            let origin = s.origin_organization_id.ok_or(ValidationError::MissingField {
                field: "origin_organization_id",
            })?;
            let tags = normalize_tags(&s.tags);
            lines
                .iter()
                .map(|line| {
                    let mut page = Page {
                        id: Uuid::new_v4(),
                        team_id: ctx.team_id,
                        name: line.name.clone(),
                        external_id: line.secondary.clone(),
                        status: s.status,
                        origin_organization_id: origin,
                        origin_organization_name: None,
                        current_organization_id: s.current_organization_id,
                        current_organization_name: None,
                        current_ad_account_id: s.current_ad_account_id,
                        current_ad_account_name: None,
                        current_manager_id: s.current_manager_id,
                        current_manager_name: None,
                        current_profile_id: s.current_profile_id,
                        current_profile_name: None,
                        usage_started_on: s.usage_started_on,
                        tags: tags.clone(),
                        created_by,
                        created_at: now,
                    };
                    normalize_new_page(&mut page, today);
                    AssetRecord::Page(page)
                })
                .collect()
        }
    };

    Ok(records)
}
