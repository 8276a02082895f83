//! Asset domain: the four entity types, their unified projection, filtering
//! and selection over the projected list.

pub mod filter;
pub mod models;
pub mod projector;
pub mod selection;
pub mod tags;

pub use filter::{compute_filtered_assets, FilterCriteria};
pub use models::*;
pub use projector::{
    find_asset, project_assets, AssetCollections, AssetRecord, AssetStatus, UnifiedAsset,
};
pub use selection::{
    on_category_change, toggle_membership, toggle_select_all, toggle_selection, SelectionState,
};
pub use tags::TagError;
