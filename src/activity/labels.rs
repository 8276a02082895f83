//! Display labels for fields and values in the activity timeline

use crate::assets::projector::EMPTY_PLACEHOLDER;
use serde_json::Value;

/// Display label for a status code, across all asset types.
pub fn status_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "active" => "Active",
        "under_review" => "Under review",
        "blocked" => "Blocked",
        "available" => "Available",
        "in_use" => "In use",
        "down" => "Down",
        "restricted" => "Restricted",
        _ => return None,
    };
    Some(label)
}

fn role_label(code: &str) -> Option<&'static str> {
    match code {
        "administrator" => Some("Administrator"),
        "advertiser" => Some("Advertiser"),
        "admin" => Some("Admin"),
        "member" => Some("Member"),
        "viewer" => Some("Viewer"),
        _ => None,
    }
}

/// Display label for a field name. Unknown fields are humanized
/// (`some_field` becomes `Some field`).
pub fn field_label(field: &str) -> String {
    let known = match field {
        "id" => Some("ID"),
        "name" => Some("Name"),
        "email" => Some("Email"),
        "profile_url" => Some("Profile URL"),
        "status" => Some("Status"),
        "received_at" => Some("Received on"),
        "blocked_at" => Some("Blocked on"),
        "tags" => Some("Tags"),
        "external_id" => Some("External ID"),
        "organization_id" | "organization_name" => Some("Business manager"),
        "organizations" => Some("Business managers"),
        "origin_organization_id" | "origin_organization_name" => Some("Origin BM"),
        "current_organization_id" | "current_organization_name" => Some("Current BM"),
        "current_ad_account_id" | "current_ad_account_name" => Some("Current ad account"),
        "current_manager_id" | "current_manager_name" => Some("Manager"),
        "current_profile_id" | "current_profile_name" => Some("Current profile"),
        "usage_started_on" => Some("In use since"),
        "linked_page" => Some("Linked page"),
        "role" => Some("Role"),
        "created_at" => Some("Created at"),
        _ => None,
    };
    match known {
        Some(label) => label.to_string(),
        None => humanize(field),
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render one JSON value for display in the context of `field`.
///
/// Null renders as the placeholder, booleans as Yes/No, arrays comma-joined,
/// status and role codes as their labels.
pub fn format_value(field: &str, value: &Value) -> String {
    match value {
        Value::Null => EMPTY_PLACEHOLDER.to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.is_empty() => EMPTY_PLACEHOLDER.to_string(),
        Value::String(s) => {
            let translated = match field {
                "status" => status_label(s),
                "role" => role_label(s),
                _ => None,
            };
            translated.map(str::to_string).unwrap_or_else(|| s.clone())
        }
        Value::Array(items) if items.is_empty() => EMPTY_PLACEHOLDER.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| format_value(field, item))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
