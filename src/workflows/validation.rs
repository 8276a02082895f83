//! Status-dependent field rules
//!
//! - A page's current organization, ad account, manager, profile and usage
//!   date only exist while it is `in_use`. Whenever the resulting status is
//!   anything else they are nulled in the same write. An `in_use` page with no
//!   usage date gets today.
//! - A blocked profile with no blocked date gets today.

use super::error::ValidationError;
use crate::assets::models::*;
use crate::assets::projector::AssetRecord;
use crate::assets::tags::normalize_tags;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

pub fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// The target organization of a new profile link.
pub fn require_link_target(organization_id: Option<Uuid>) -> Result<Uuid, ValidationError> {
    organization_id.ok_or(ValidationError::MissingField {
        field: "organization_id",
    })
}

/// A page manager must be a member of the caller's team.
pub fn check_manager(
    manager_id: Option<Uuid>,
    members: &[TeamMember],
) -> Result<(), ValidationError> {
    match manager_id {
        Some(id) if !members.iter().any(|m| m.id == id) => {
            Err(ValidationError::ManagerNotInTeam(id))
        }
        _ => Ok(()),
    }
}

/// Parse a `{column: value}` map into a typed patch for `asset_type`.
pub fn parse_patch(
    asset_type: AssetType,
    fields: Map<String, Value>,
) -> Result<AssetPatch, ValidationError> {
    if fields.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }
    AssetPatch::from_fields(asset_type, fields).map_err(|e| ValidationError::InvalidPatch {
        asset_type,
        reason: e.to_string(),
    })
}

pub fn normalize_new_profile(profile: &mut Profile, today: NaiveDate) {
    if profile.status == ProfileStatus::Blocked {
        profile.blocked_at.get_or_insert(today);
    }
}

pub fn normalize_new_page(page: &mut Page, today: NaiveDate) {
    if page.status == PageStatus::InUse {
        page.usage_started_on.get_or_insert(today);
    } else {
        page.clear_usage();
    }
}

/// Validate `patch` against the record it will be applied to and return the
/// patch to persist, with dependent fields filled in or cleared.
pub fn prepare_update(
    patch: &AssetPatch,
    current: &AssetRecord,
    today: NaiveDate,
) -> Result<AssetPatch, ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }

    let prepared = match (patch, current) {
        (AssetPatch::Profile(p), AssetRecord::Profile(current)) => {
            AssetPatch::Profile(prepare_profile(p, current, today)?)
        }
        (AssetPatch::Organization(p), AssetRecord::Organization(_)) => {
            let mut p = p.clone();
            clean_common(&mut p.name, &mut p.tags)?;
            AssetPatch::Organization(p)
        }
        (AssetPatch::AdAccount(p), AssetRecord::AdAccount(_)) => {
            let mut p = p.clone();
            clean_common(&mut p.name, &mut p.tags)?;
            AssetPatch::AdAccount(p)
        }
        (AssetPatch::Page(p), AssetRecord::Page(current)) => {
            AssetPatch::Page(prepare_page(p, current, today)?)
        }
        (patch, current) => {
            return Err(ValidationError::InvalidPatch {
                asset_type: current.asset_type(),
                reason: format!("a {} patch does not apply", patch.asset_type()),
            })
        }
    };
    Ok(prepared)
}

fn clean_common(
    name: &mut Option<String>,
    tags: &mut Option<Vec<String>>,
) -> Result<(), ValidationError> {
    if let Some(n) = name {
        require_name(n)?;
        *n = n.trim().to_string();
    }
    if let Some(t) = tags {
        *t = normalize_tags(t);
    }
    Ok(())
}

fn prepare_profile(
    patch: &ProfilePatch,
    current: &Profile,
    today: NaiveDate,
) -> Result<ProfilePatch, ValidationError> {
    let mut p = patch.clone();
    clean_common(&mut p.name, &mut p.tags)?;

    let status = p.status.unwrap_or(current.status);
    let blocked_at = p.blocked_at.unwrap_or(current.blocked_at);
    if status == ProfileStatus::Blocked && blocked_at.is_none() {
        p.blocked_at = Some(Some(today));
    }
    Ok(p)
}

fn prepare_page(
    patch: &PagePatch,
    current: &Page,
    today: NaiveDate,
) -> Result<PagePatch, ValidationError> {
    let mut p = patch.clone();
    clean_common(&mut p.name, &mut p.tags)?;

    let status = p.status.unwrap_or(current.status);
    if status == PageStatus::InUse {
        let usage = p.usage_started_on.unwrap_or(current.usage_started_on);
        if usage.is_none() {
            p.usage_started_on = Some(Some(today));
        }
        return Ok(p);
    }

    // Only touch columns that are set now or that the patch tries to set.
    if p.current_organization_id.is_some() || current.current_organization_id.is_some() {
        p.current_organization_id = Some(None);
    }
    if p.current_ad_account_id.is_some() || current.current_ad_account_id.is_some() {
        p.current_ad_account_id = Some(None);
    }
    if p.current_manager_id.is_some() || current.current_manager_id.is_some() {
        p.current_manager_id = Some(None);
    }
    if p.current_profile_id.is_some() || current.current_profile_id.is_some() {
        p.current_profile_id = Some(None);
    }
    if p.usage_started_on.is_some() || current.usage_started_on.is_some() {
        p.usage_started_on = Some(None);
    }
    Ok(p)
}

/// Manager referenced by a patch, if it sets one.
pub fn patch_manager(patch: &AssetPatch) -> Option<Uuid> {
    match patch {
        AssetPatch::Page(p) => p.current_manager_id.flatten(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::test_helpers::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn page_in_use() -> Page {
        let team = Uuid::new_v4();
        let org = test_organization(team, "BM");
        let mut page = test_page(team, "P", &org);
        page.status = PageStatus::InUse;
        page.current_organization_id = Some(org.id);
        page.current_manager_id = Some(Uuid::new_v4());
        page.usage_started_on = NaiveDate::from_ymd_opt(2024, 1, 10);
        page
    }

    #[test]
    fn test_leaving_in_use_clears_dependents() {
        let page = page_in_use();
        let patch = AssetPatch::Page(PagePatch {
            status: Some(PageStatus::Restricted),
            ..Default::default()
        });
        let AssetPatch::Page(p) = prepare_update(&patch, &AssetRecord::Page(page), today()).unwrap()
        else {
            panic!("expected page patch")
        };
        assert_eq!(p.current_organization_id, Some(None));
        assert_eq!(p.current_manager_id, Some(None));
        assert_eq!(p.usage_started_on, Some(None));
        // Columns already null are left out of the write.
        assert_eq!(p.current_ad_account_id, None);
    }

    #[test]
    fn test_dependents_cannot_be_set_outside_in_use() {
        let team = Uuid::new_v4();
        let org = test_organization(team, "BM");
        let page = test_page(team, "P", &org);
        let patch = AssetPatch::Page(PagePatch {
            current_organization_id: Some(Some(org.id)),
            ..Default::default()
        });
        let AssetPatch::Page(p) = prepare_update(&patch, &AssetRecord::Page(page), today()).unwrap()
        else {
            panic!("expected page patch")
        };
        assert_eq!(p.current_organization_id, Some(None));
    }

    #[test]
    fn test_entering_in_use_defaults_usage_date() {
        let team = Uuid::new_v4();
        let org = test_organization(team, "BM");
        let page = test_page(team, "P", &org);
        let patch = AssetPatch::Page(PagePatch {
            status: Some(PageStatus::InUse),
            current_organization_id: Some(Some(org.id)),
            ..Default::default()
        });
        let AssetPatch::Page(p) = prepare_update(&patch, &AssetRecord::Page(page), today()).unwrap()
        else {
            panic!("expected page patch")
        };
        assert_eq!(p.usage_started_on, Some(Some(today())));
        assert_eq!(p.current_organization_id, Some(Some(org.id)));
    }

    #[test]
    fn test_in_use_keeps_existing_usage_date() {
        let page = page_in_use();
        let patch = AssetPatch::Page(PagePatch {
            name: Some("Renamed".into()),
            ..Default::default()
        });
        let AssetPatch::Page(p) = prepare_update(&patch, &AssetRecord::Page(page), today()).unwrap()
        else {
            panic!("expected page patch")
        };
        assert_eq!(p.usage_started_on, None);
    }

    #[test]
    fn test_blocking_profile_defaults_blocked_date() {
        let profile = test_profile(Uuid::new_v4(), "P");
        let patch = AssetPatch::Profile(ProfilePatch {
            status: Some(ProfileStatus::Blocked),
            ..Default::default()
        });
        let AssetPatch::Profile(p) =
            prepare_update(&patch, &AssetRecord::Profile(profile), today()).unwrap()
        else {
            panic!("expected profile patch")
        };
        assert_eq!(p.blocked_at, Some(Some(today())));
    }

    #[test]
    fn test_new_records_normalized() {
        let mut page = page_in_use();
        page.usage_started_on = None;
        normalize_new_page(&mut page, today());
        assert_eq!(page.usage_started_on, Some(today()));

        page.status = PageStatus::Available;
        normalize_new_page(&mut page, today());
        assert!(page.current_organization_id.is_none());
        assert!(page.usage_started_on.is_none());

        let mut profile = test_profile(Uuid::new_v4(), "P");
        profile.status = ProfileStatus::Blocked;
        normalize_new_profile(&mut profile, today());
        assert_eq!(profile.blocked_at, Some(today()));
    }

    #[test]
    fn test_type_mismatch_and_blank_name() {
        let org = test_organization(Uuid::new_v4(), "BM");
        let patch = AssetPatch::Page(PagePatch {
            name: Some("x".into()),
            ..Default::default()
        });
        assert!(matches!(
            prepare_update(&patch, &AssetRecord::Organization(org.clone()), today()),
            Err(ValidationError::InvalidPatch { .. })
        ));

        let blank = AssetPatch::Organization(OrganizationPatch {
            name: Some("   ".into()),
            ..Default::default()
        });
        assert_eq!(
            prepare_update(&blank, &AssetRecord::Organization(org), today()).unwrap_err(),
            ValidationError::EmptyName
        );
    }

    #[test]
    fn test_manager_must_be_in_team() {
        let team = Uuid::new_v4();
        let member = test_team_member(team, "Marta", Role::Member);
        assert!(check_manager(Some(member.id), std::slice::from_ref(&member)).is_ok());
        assert!(check_manager(None, &[]).is_ok());
        let stranger = Uuid::new_v4();
        assert_eq!(
            check_manager(Some(stranger), &[member]).unwrap_err(),
            ValidationError::ManagerNotInTeam(stranger)
        );
    }

    #[test]
    fn test_link_target_required() {
        assert_eq!(
            require_link_target(None).unwrap_err(),
            ValidationError::MissingField {
                field: "organization_id"
            }
        );
    }

    #[test]
    fn test_parse_patch_errors() {
        assert_eq!(
            parse_patch(AssetType::Page, Map::new()).unwrap_err(),
            ValidationError::EmptyPatch
        );
        let mut fields = Map::new();
        fields.insert("status".into(), Value::String("exploded".into()));
        assert!(matches!(
            parse_patch(AssetType::Page, fields),
            Err(ValidationError::InvalidPatch { .. })
        ));
    }
}
