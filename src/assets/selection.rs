//! Multi-row selection over the filtered asset list
//!
//! Selection is a pure reducer: every transition takes the current state plus
//! the ids of the filtered list in its current order and returns a new state.
//! The range anchor is an explicit value, reset whenever the category changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected: BTreeSet<Uuid>,
    /// Index in the filtered list of the last clicked row
    pub last_selected_index: Option<usize>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Drop ids that are no longer in the filtered list.
    pub fn retain_visible(&self, ordered_ids: &[Uuid]) -> Self {
        let visible: BTreeSet<&Uuid> = ordered_ids.iter().collect();
        Self {
            selected: self
                .selected
                .iter()
                .filter(|id| visible.contains(id))
                .copied()
                .collect(),
            last_selected_index: self
                .last_selected_index
                .filter(|&i| i < ordered_ids.len()),
        }
    }
}

/// Handle a row click.
///
/// With the range modifier and an anchor, every row between the anchor and
/// `index` (inclusive, in the current order of `ordered_ids`) is added to the
/// selection. Without it, the clicked row becomes the only selected row, or is
/// deselected if it was already selected. Either way the anchor moves to `index`.
pub fn toggle_selection(
    current: &SelectionState,
    id: Uuid,
    index: usize,
    ordered_ids: &[Uuid],
    range_modifier: bool,
) -> SelectionState {
    if range_modifier && !ordered_ids.is_empty() {
        if let Some(anchor) = current.last_selected_index {
            let last = ordered_ids.len() - 1;
            let start = anchor.min(index).min(last);
            let end = anchor.max(index).min(last);
            let mut selected = current.selected.clone();
            selected.extend(ordered_ids[start..=end].iter().copied());
            return SelectionState {
                selected,
                last_selected_index: Some(index),
            };
        }
    }

    let selected = if current.selected.contains(&id) {
        let mut selected = current.selected.clone();
        selected.remove(&id);
        selected
    } else {
        BTreeSet::from([id])
    };

    SelectionState {
        selected,
        last_selected_index: Some(index),
    }
}

/// Checkbox-style toggle: flips one row and leaves the others untouched.
pub fn toggle_membership(current: &SelectionState, id: Uuid, index: usize) -> SelectionState {
    let mut selected = current.selected.clone();
    if !selected.remove(&id) {
        selected.insert(id);
    }
    SelectionState {
        selected,
        last_selected_index: Some(index),
    }
}

/// Toggle between "nothing" and "every row currently in the filtered list".
pub fn toggle_select_all(current: &SelectionState, ordered_ids: &[Uuid]) -> SelectionState {
    let all_selected =
        !ordered_ids.is_empty() && ordered_ids.iter().all(|id| current.selected.contains(id));
    if all_selected {
        SelectionState::default()
    } else {
        SelectionState {
            selected: ordered_ids.iter().copied().collect(),
            last_selected_index: None,
        }
    }
}

/// Switching tabs never carries ids across to a different type set.
pub fn on_category_change(_current: &SelectionState) -> SelectionState {
    SelectionState::default()
}
