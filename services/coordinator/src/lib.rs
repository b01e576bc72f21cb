//! Allotment Coordinator
//!
//! Glue between the stored entities, the allocation engine and the result
//! store. Owns the run guard so that at most one matching runs at a time.

pub mod config;
pub mod desk;
pub mod error;
pub mod snapshot;

pub use config::CoordinatorConfig;
pub use desk::{AllotmentDesk, TriggerOutcome};
pub use error::CoordinatorError;
pub use snapshot::{JsonFileSource, Snapshot, SnapshotSource};
