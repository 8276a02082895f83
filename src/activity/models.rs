//! Activity log records and the typed view of their `changes` payload
//!
//! The persisted `changes` JSON keeps its historical shape:
//!
//! - create / delete: flat `{field: value}` snapshot
//! - update: `{field: {"old": value, "new": value}}`
//!
//! [`DiffEntry`] is the parsed form used by the renderer.

use crate::assets::models::{AssetRef, AssetType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Most recent entries returned by one activity query
pub const ACTIVITY_QUERY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub team_id: Uuid,
    pub entity_type: AssetType,
    /// Kept as text for compatibility with historical rows
    pub entity_id: String,
    pub action_type: ActionType,
    pub changes: Value,
    pub actor_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        team_id: Uuid,
        entity: AssetRef,
        action_type: ActionType,
        changes: Value,
        actor_name: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            entity_type: entity.asset_type,
            entity_id: entity.id.to_string(),
            action_type,
            changes,
            actor_name,
            created_at: Utc::now(),
        }
    }

    /// Parsed view of `changes`, `None` when the payload is not an object.
    pub fn diff(&self) -> Option<DiffEntry> {
        DiffEntry::parse(&self.changes, self.action_type)
    }
}

/// One `{old, new}` pair of an update diff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    pub fn new(old: Value, new: Value) -> Self {
        Self { old, new }
    }
}

/// Typed form of an entry's `changes` payload
#[derive(Debug, Clone, PartialEq)]
pub enum DiffEntry {
    Created(Map<String, Value>),
    Updated(Vec<(String, FieldChange)>),
    Deleted(Map<String, Value>),
}

impl DiffEntry {
    /// Parse the wire payload. Anything but a JSON object yields `None`; in an
    /// update payload, entries that are not `{old, new}` objects are skipped.
    pub fn parse(changes: &Value, action: ActionType) -> Option<Self> {
        let map = changes.as_object()?;
        let entry = match action {
            ActionType::Create => Self::Created(map.clone()),
            ActionType::Delete => Self::Deleted(map.clone()),
            ActionType::Update => Self::Updated(
                map.iter()
                    .filter_map(|(field, value)| {
                        let pair = value.as_object()?;
                        match (pair.get("old"), pair.get("new")) {
                            (Some(old), Some(new)) => {
                                Some((field.clone(), FieldChange::new(old.clone(), new.clone())))
                            }
                            _ => None,
                        }
                    })
                    .collect(),
            ),
        };
        Some(entry)
    }

    /// Back to the wire shape.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Created(map) | Self::Deleted(map) => Value::Object(map.clone()),
            Self::Updated(changes) => {
                let mut map = Map::new();
                for (field, change) in changes {
                    map.insert(field.clone(), update_pair(&change.old, &change.new));
                }
                Value::Object(map)
            }
        }
    }
}

fn update_pair(old: &Value, new: &Value) -> Value {
    let mut pair = Map::new();
    pair.insert("old".to_string(), old.clone());
    pair.insert("new".to_string(), new.clone());
    Value::Object(pair)
}

/// `{field: {"old": old, "new": new}}` for a single edited field.
pub fn field_update(field: &str, old: Value, new: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), update_pair(&old, &new));
    Value::Object(map)
}

/// Filter for an activity query. Results are newest first and capped at
/// [`ACTIVITY_QUERY_LIMIT`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityQuery {
    #[serde(default)]
    pub entity_type: Option<AssetType>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    ACTIVITY_QUERY_LIMIT
}

impl Default for ActivityQuery {
    fn default() -> Self {
        Self {
            entity_type: None,
            entity_id: None,
            limit: ACTIVITY_QUERY_LIMIT,
        }
    }
}

impl ActivityQuery {
    pub fn for_entity(entity: AssetRef) -> Self {
        Self {
            entity_type: Some(entity.asset_type),
            entity_id: Some(entity.id.to_string()),
            ..Default::default()
        }
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, ACTIVITY_QUERY_LIMIT)
    }

    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        self.entity_type.map_or(true, |t| t == entry.entity_type)
            && self
                .entity_id
                .as_deref()
                .map_or(true, |id| id == entry.entity_id)
    }
}
