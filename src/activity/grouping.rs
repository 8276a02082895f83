//! Timeline grouping
//!
//! Entries arrive newest first. Adjacent entries sharing the actor, the
//! calendar date and the `HH:MM` time collapse into one group. This is a single
//! forward pass: entries are never re-sorted or re-bucketed, so two matching
//! entries separated by a different one stay in separate groups.

use super::models::ActivityLogEntry;
use super::render::{render_changes, DisplayLine};
use crate::context::DEFAULT_ACTOR;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

/// An entry with its rendered lines
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineItem {
    #[serde(flatten)]
    pub entry: ActivityLogEntry,
    pub lines: Vec<DisplayLine>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityGroup {
    pub actor_name: String,
    pub date: NaiveDate,
    /// `HH:MM` in the display offset
    pub time: String,
    pub items: Vec<TimelineItem>,
}

/// Offset used to derive dates and times, from a minute count east of UTC.
/// Out-of-range values fall back to UTC.
pub fn display_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

fn group_key(entry: &ActivityLogEntry, offset: FixedOffset) -> (String, NaiveDate, String) {
    let local = entry.created_at.with_timezone(&offset);
    let actor = entry
        .actor_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string();
    (actor, local.date_naive(), local.format("%H:%M").to_string())
}

/// Group already-sorted entries, rendering each one's changes.
pub fn group_entries(entries: Vec<ActivityLogEntry>, offset: FixedOffset) -> Vec<ActivityGroup> {
    let mut groups: Vec<ActivityGroup> = Vec::new();

    for entry in entries {
        let (actor_name, date, time) = group_key(&entry, offset);
        let lines = render_changes(&entry.changes, entry.action_type);
        let item = TimelineItem { entry, lines };

        match groups.last_mut() {
            Some(group)
                if group.actor_name == actor_name && group.date == date && group.time == time =>
            {
                group.items.push(item);
            }
            _ => groups.push(ActivityGroup {
                actor_name,
                date,
                time,
                items: vec![item],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::models::ActionType;
    use crate::assets::models::{AssetRef, AssetType};
    use chrono::{DateTime, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    fn entry_at(actor: Option<&str>, at: DateTime<Utc>) -> ActivityLogEntry {
        let mut entry = ActivityLogEntry::new(
            Uuid::new_v4(),
            AssetRef::new(AssetType::Page, Uuid::new_v4()),
            ActionType::Update,
            json!({"status": {"old": "available", "new": "in_use"}}),
            actor.map(str::to_string),
        );
        entry.created_at = at;
        entry
    }

    fn utc() -> FixedOffset {
        display_offset(0)
    }

    #[test]
    fn test_same_minute_merges_next_minute_splits() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 14, 31, 50).unwrap();
        let entries = vec![
            entry_at(Some("Ana"), base + chrono::Duration::minutes(1)),
            entry_at(Some("Ana"), base + chrono::Duration::seconds(5)),
            entry_at(Some("Ana"), base),
            entry_at(Some("Ana"), base - chrono::Duration::seconds(20)),
        ];
        // Newest first: 14:32:50, 14:31:55, 14:31:50, 14:31:30.
        let groups = group_entries(entries, utc());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].items.len(), 1);
        assert_eq!(groups[0].time, "14:32");
        assert_eq!(groups[1].items.len(), 3);
        assert_eq!(groups[1].time, "14:31");
    }

    #[test]
    fn test_three_then_one_minute_later() {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 10).unwrap();
        let later = t + chrono::Duration::minutes(1);
        // Sorted newest first: the later one leads.
        let groups = group_entries(
            vec![
                entry_at(Some("Ana"), later),
                entry_at(Some("Ana"), t),
                entry_at(Some("Ana"), t),
                entry_at(Some("Ana"), t),
            ],
            utc(),
        );
        let sizes: Vec<usize> = groups.iter().map(|g| g.items.len()).collect();
        assert_eq!(sizes, vec![1, 3]);

        let groups = group_entries(
            vec![
                entry_at(Some("Ana"), t),
                entry_at(Some("Ana"), t),
                entry_at(Some("Ana"), t),
                entry_at(Some("Ana"), later),
            ],
            utc(),
        );
        let sizes: Vec<usize> = groups.iter().map(|g| g.items.len()).collect();
        assert_eq!(sizes, vec![3, 1]);
    }

    #[test]
    fn test_actor_change_splits() {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let groups = group_entries(
            vec![entry_at(Some("Ana"), t), entry_at(Some("Bruno"), t)],
            utc(),
        );
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_no_retroactive_merge() {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let groups = group_entries(
            vec![
                entry_at(Some("Ana"), t),
                entry_at(Some("Bruno"), t),
                entry_at(Some("Ana"), t),
            ],
            utc(),
        );
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_missing_actor_is_system() {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let groups = group_entries(vec![entry_at(None, t), entry_at(Some(""), t)], utc());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].actor_name, DEFAULT_ACTOR);
    }

    #[test]
    fn test_offset_moves_calendar_date() {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 1, 30, 0).unwrap();
        let groups = group_entries(vec![entry_at(Some("Ana"), t)], display_offset(-180));
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(groups[0].time, "22:30");
    }

    #[test]
    fn test_items_carry_rendered_lines() {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let groups = group_entries(vec![entry_at(Some("Ana"), t)], utc());
        assert_eq!(
            groups[0].items[0].lines[0].to_string(),
            "Status: Available → In use"
        );
    }
}
