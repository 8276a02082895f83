//! In-memory filtering of the unified asset list
//!
//! Categories combine with AND; the values selected inside one facet combine
//! with OR. An empty facet does not filter.

use super::models::AssetType;
use super::projector::UnifiedAsset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Active filters over the unified list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterCriteria {
    /// Tab restriction, applied before the facets
    pub category: Option<AssetType>,
    /// Case-insensitive substring over name, detail line and tags
    pub search: String,
    /// Status codes, e.g. `in_use`
    pub statuses: BTreeSet<String>,
    pub types: BTreeSet<AssetType>,
    pub organizations: BTreeSet<Uuid>,
}

impl FilterCriteria {
    pub fn with_category(mut self, category: AssetType) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.insert(status.into());
        self
    }

    pub fn with_type(mut self, asset_type: AssetType) -> Self {
        self.types.insert(asset_type);
        self
    }

    pub fn with_organization(mut self, organization_id: Uuid) -> Self {
        self.organizations.insert(organization_id);
        self
    }

    /// Whether `asset` passes every active filter.
    pub fn matches(&self, asset: &UnifiedAsset) -> bool {
        if let Some(category) = self.category {
            if asset.asset_type != category {
                return false;
            }
        }

        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let hit = asset.name.to_lowercase().contains(&needle)
                || asset.display_summary.to_lowercase().contains(&needle)
                || asset
                    .original_data
                    .tags()
                    .iter()
                    .any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !self.statuses.is_empty() && !self.statuses.contains(&asset.status.code()) {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(&asset.asset_type) {
            return false;
        }

        if !self.organizations.is_empty() {
            match asset.original_data.organization_id() {
                Some(org) if self.organizations.contains(&org) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Narrow `all` to the assets matching `criteria`, preserving order.
pub fn compute_filtered_assets(
    all: &[UnifiedAsset],
    criteria: &FilterCriteria,
) -> Vec<UnifiedAsset> {
    all.iter()
        .filter(|asset| criteria.matches(asset))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::models::PageStatus;
    use crate::assets::projector::{project_assets, AssetCollections};
    use crate::test_helpers::*;

    struct Fixture {
        assets: Vec<UnifiedAsset>,
        org_a: Uuid,
        org_b: Uuid,
    }

    fn fixture() -> Fixture {
        let team = Uuid::new_v4();
        let mut org_a = test_organization(team, "Alpha BM");
        org_a.tags = vec!["Premium".into()];
        let org_b = test_organization(team, "Beta BM");

        let mut profile = test_profile(team, "Joana");
        profile.email = Some("joana@example.com".into());
        let account = test_ad_account(team, "Spend 01", Some(&org_a));
        let mut page_a = test_page(team, "Recipes", &org_a);
        page_a.status = PageStatus::InUse;
        let page_b = test_page(team, "Travel", &org_b);

        let assets = project_assets(&AssetCollections {
            profiles: Some(vec![profile]),
            organizations: Some(vec![org_a.clone(), org_b.clone()]),
            ad_accounts: Some(vec![account]),
            pages: Some(vec![page_a, page_b]),
        });

        Fixture {
            assets,
            org_a: org_a.id,
            org_b: org_b.id,
        }
    }

    fn names(assets: &[UnifiedAsset]) -> BTreeSet<String> {
        assets.iter().map(|a| a.name.clone()).collect()
    }

    #[test]
    fn test_empty_criteria_keeps_everything() {
        let f = fixture();
        let out = compute_filtered_assets(&f.assets, &FilterCriteria::default());
        assert_eq!(out, f.assets);
    }

    #[test]
    fn test_search_matches_name_detail_and_tags() {
        let f = fixture();

        let by_name =
            compute_filtered_assets(&f.assets, &FilterCriteria::default().with_search("RECIP"));
        assert_eq!(names(&by_name), BTreeSet::from(["Recipes".to_string()]));

        let by_detail =
            compute_filtered_assets(&f.assets, &FilterCriteria::default().with_search("joana@"));
        assert_eq!(names(&by_detail), BTreeSet::from(["Joana".to_string()]));

        let by_tag =
            compute_filtered_assets(&f.assets, &FilterCriteria::default().with_search("premium"));
        assert_eq!(names(&by_tag), BTreeSet::from(["Alpha BM".to_string()]));
    }

    #[test]
    fn test_search_by_origin_organization_name() {
        let f = fixture();
        let out =
            compute_filtered_assets(&f.assets, &FilterCriteria::default().with_search("beta"));
        assert_eq!(
            names(&out),
            BTreeSet::from(["Beta BM".to_string(), "Travel".to_string()])
        );
    }

    #[test]
    fn test_status_facet_is_or_within_facet() {
        let f = fixture();
        let criteria = FilterCriteria::default()
            .with_status("in_use")
            .with_status("available");
        let out = compute_filtered_assets(&f.assets, &criteria);
        assert_eq!(
            names(&out),
            BTreeSet::from(["Recipes".to_string(), "Travel".to_string()])
        );
    }

    #[test]
    fn test_facets_combine_with_and() {
        let f = fixture();
        let criteria = FilterCriteria::default()
            .with_type(AssetType::Page)
            .with_organization(f.org_a);
        let out = compute_filtered_assets(&f.assets, &criteria);
        assert_eq!(names(&out), BTreeSet::from(["Recipes".to_string()]));
    }

    #[test]
    fn test_organization_facet_resolution() {
        let f = fixture();
        let out = compute_filtered_assets(
            &f.assets,
            &FilterCriteria::default().with_organization(f.org_a),
        );
        // Organization itself, its ad account and the page it originated; never profiles.
        assert_eq!(
            names(&out),
            BTreeSet::from([
                "Alpha BM".to_string(),
                "Spend 01".to_string(),
                "Recipes".to_string()
            ])
        );

        let out = compute_filtered_assets(
            &f.assets,
            &FilterCriteria::default().with_organization(f.org_b),
        );
        assert_eq!(
            names(&out),
            BTreeSet::from(["Beta BM".to_string(), "Travel".to_string()])
        );
    }

    #[test]
    fn test_category_restricts_before_facets() {
        let f = fixture();
        let criteria = FilterCriteria::default()
            .with_category(AssetType::Organization)
            .with_type(AssetType::Page);
        assert!(compute_filtered_assets(&f.assets, &criteria).is_empty());

        let criteria = FilterCriteria::default()
            .with_category(AssetType::Organization)
            .with_search("bm");
        assert_eq!(compute_filtered_assets(&f.assets, &criteria).len(), 2);
    }

    #[test]
    fn test_filter_preserves_projection_order() {
        let f = fixture();
        let out = compute_filtered_assets(
            &f.assets,
            &FilterCriteria::default().with_type(AssetType::Page),
        );
        let expected: Vec<_> = f
            .assets
            .iter()
            .filter(|a| a.asset_type == AssetType::Page)
            .map(|a| a.id)
            .collect();
        let got: Vec<_> = out.iter().map(|a| a.id).collect();
        assert_eq!(got, expected);
    }
}
