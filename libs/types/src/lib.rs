//! Types library for the branch allotment system
//!
//! Plain data shared by the allocation engine, the result store and the
//! coordinator. Nothing in here knows how entities are stored or shown.
//!
//! # Modules
//! - `ids`: Identifiers (StudentId, BranchId, ResultId)
//! - `priority`: Total ordering of students by merit rank
//! - `student`: Student entity (proposer)
//! - `branch`: Branch entity (receiver with seat capacity)
//! - `allotment`: Per-student outcome and matching result records
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod priority;
pub mod student;
pub mod branch;
pub mod allotment;
pub mod errors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::priority::*;
    pub use crate::student::*;
    pub use crate::branch::*;
    pub use crate::allotment::*;
    pub use crate::errors::*;
}
