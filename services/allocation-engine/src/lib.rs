//! Allocation Engine Service
//!
//! Assigns students to branch seats with student-proposing deferred
//! acceptance (Gale–Shapley). Branches rank every student the same way, by
//! merit rank, and never hold more students than they have seats.
//!
//! **Key Invariants:**
//! - Every student appears exactly once in a result, matched or unmatched
//! - No branch exceeds its seat count
//! - The assignment is stable and student-optimal
//! - Deterministic (same snapshot → same result)

pub mod holding;
pub mod preferences;
pub mod engine;
pub mod events;
pub mod outcome;
pub mod stability;

pub use engine::{AllocationEngine, EngineConfig, NoRunReason, RunOutcome};
pub use outcome::{BranchFill, MatchingOutcome};
pub use preferences::{default_preference_order, resolve_proposers, Proposer};
