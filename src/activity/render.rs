//! Turns an entry's `changes` payload into display lines

use super::labels::{field_label, format_value};
use super::models::{ActionType, DiffEntry};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Bookkeeping fields never shown in create/delete snapshots
const HIDDEN_SNAPSHOT_FIELDS: &[&str] = &["team_id", "created_by"];

/// One rendered line: `label: value`, or `label: old → new` for updates.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DisplayLine {
    pub field: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    pub value: String,
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "{}: {} → {}", self.label, old, self.value),
            None => write!(f, "{}: {}", self.label, self.value),
        }
    }
}

/// Render a raw `changes` payload. Payloads that are not objects render nothing.
pub fn render_changes(changes: &Value, action: ActionType) -> Vec<DisplayLine> {
    DiffEntry::parse(changes, action)
        .map(|diff| render_diff(&diff))
        .unwrap_or_default()
}

pub fn render_diff(diff: &DiffEntry) -> Vec<DisplayLine> {
    match diff {
        DiffEntry::Created(fields) | DiffEntry::Deleted(fields) => render_snapshot(fields),
        DiffEntry::Updated(changes) => changes
            .iter()
            .map(|(field, change)| DisplayLine {
                field: field.clone(),
                label: field_label(field),
                old: Some(format_value(field, &change.old)),
                value: format_value(field, &change.new),
            })
            .collect(),
    }
}

fn render_snapshot(fields: &Map<String, Value>) -> Vec<DisplayLine> {
    fields
        .iter()
        .filter(|(field, value)| {
            !value.is_null() && !HIDDEN_SNAPSHOT_FIELDS.contains(&field.as_str())
        })
        .map(|(field, value)| DisplayLine {
            field: field.clone(),
            label: field_label(field),
            old: None,
            value: format_value(field, value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_update_renders_old_then_new() {
        let lines = render_changes(
            &json!({"status": {"old": "available", "new": "in_use"}}),
            ActionType::Update,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].label, "Status");
        assert_eq!(lines[0].old.as_deref(), Some("Available"));
        assert_eq!(lines[0].value, "In use");
        assert_eq!(lines[0].to_string(), "Status: Available → In use");
    }

    #[test]
    fn test_update_skips_entries_without_both_keys() {
        let lines = render_changes(
            &json!({
                "name": {"old": "a"},
                "tags": ["loose"],
                "blocked_at": {"old": null, "new": "2024-03-02"}
            }),
            ActionType::Update,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].to_string(), "Blocked on: — → 2024-03-02");
    }

    #[test]
    fn test_create_snapshot_hides_bookkeeping_and_nulls() {
        let lines = render_changes(
            &json!({
                "name": "Page 1",
                "status": "available",
                "team_id": "t",
                "created_by": "u",
                "current_manager_id": null,
                "tags": ["hot", "new"]
            }),
            ActionType::Create,
        );
        let rendered: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["Name: Page 1", "Status: Available", "Tags: hot, new"]
        );
    }

    #[test]
    fn test_delete_uses_snapshot_treatment() {
        let lines = render_changes(
            &json!({"name": "Old BM", "external_id": "123"}),
            ActionType::Delete,
        );
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.old.is_none()));
    }

    #[test]
    fn test_malformed_changes_render_nothing() {
        assert!(render_changes(&json!("text"), ActionType::Update).is_empty());
        assert!(render_changes(&json!(42), ActionType::Create).is_empty());
        assert!(render_changes(&Value::Null, ActionType::Delete).is_empty());
    }
}
