//! Audit trail: log entries, diff rendering and timeline grouping

pub mod grouping;
pub mod labels;
pub mod models;
pub mod render;

pub use grouping::{display_offset, group_entries, ActivityGroup, TimelineItem};
pub use models::{
    field_update, ActionType, ActivityLogEntry, ActivityQuery, DiffEntry, FieldChange,
    ACTIVITY_QUERY_LIMIT,
};
pub use render::{render_changes, render_diff, DisplayLine};
