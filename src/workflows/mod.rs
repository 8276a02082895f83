//! Mutation workflows
//!
//! Batch creation, single and bulk edits, tags, profile links and deletes.
//! Every write is validated first and audited after.

pub mod batch;
pub mod error;
pub mod manager;
pub mod validation;

pub use batch::{
    parse_batch, AdAccountSettings, BatchCreate, CommonSettings, OrganizationSettings, PageSettings,
    ProfileSettings, StagedLine,
};
pub use error::{MutationError, ValidationError};
pub use manager::{AssetManager, BulkOutcome, BulkUpdate, MutationResult, TypeOutcome};
