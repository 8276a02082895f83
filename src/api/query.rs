//! Query parameter structs for list and activity endpoints

use crate::activity::models::{ActivityQuery, ACTIVITY_QUERY_LIMIT};
use crate::assets::filter::FilterCriteria;
use crate::assets::models::AssetType;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use uuid::Uuid;

/// Helper to deserialize optional numbers from query string
fn deserialize_option_from_str<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    use serde::de::Error;
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if !s.is_empty() => s.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

/// Split a comma-separated value, trimming and dropping empty parts
fn comma_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Filters for `GET /api/assets`. Every facet accepts a comma-separated list.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AssetListQuery {
    /// Tab: `all` (or absent) or one asset type
    pub category: Option<String>,
    pub search: Option<String>,
    /// Status codes, e.g. "available,in_use"
    pub status: Option<String>,
    /// Asset types, e.g. "page,ad_account"
    #[serde(rename = "type")]
    pub types: Option<String>,
    /// Organization ids
    pub organization: Option<String>,
}

impl AssetListQuery {
    /// Build filter criteria, rejecting unknown types and malformed ids.
    pub fn to_criteria(&self) -> Result<FilterCriteria, String> {
        let mut criteria = FilterCriteria::default();

        match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("all") => {}
            Some(category) => criteria = criteria.with_category(category.parse()?),
        }
        if let Some(search) = &self.search {
            criteria = criteria.with_search(search.clone());
        }
        for status in comma_list(&self.status) {
            criteria = criteria.with_status(status);
        }
        for asset_type in comma_list(&self.types) {
            criteria = criteria.with_type(asset_type.parse::<AssetType>()?);
        }
        for organization in comma_list(&self.organization) {
            let id: Uuid = organization
                .parse()
                .map_err(|_| format!("Invalid organization id: {}", organization))?;
            criteria = criteria.with_organization(id);
        }
        Ok(criteria)
    }
}

/// Parameters for `GET /api/activity`
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ActivityParams {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Max entries (capped at 50)
    #[serde(default, deserialize_with = "deserialize_option_from_str")]
    pub limit: Option<usize>,
}

impl ActivityParams {
    pub fn to_query(&self) -> Result<ActivityQuery, String> {
        let entity_type = match self.entity_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(t) => Some(t.parse::<AssetType>()?),
        };
        Ok(ActivityQuery {
            entity_type,
            entity_id: self
                .entity_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            limit: self.limit.unwrap_or(ACTIVITY_QUERY_LIMIT),
        })
    }
}
