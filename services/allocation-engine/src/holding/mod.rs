//! Per-branch seat holding
//!
//! Contains the bounded, priority-ordered holding set each branch keeps
//! while the proposal loop runs.

pub mod holding_set;

pub use holding_set::{HoldDecision, Holder, HoldingSet};
