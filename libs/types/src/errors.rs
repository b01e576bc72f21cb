//! Error types for the allotment system
//!
//! Error taxonomy using thiserror. An empty run is not in here: it is a
//! normal outcome and is reported as a value, not an error.

use thiserror::Error;

/// Allocation engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The proposal loop hit its iteration bound. A correct run never gets
    /// here; it means the input or the engine is inconsistent.
    #[error("Safety cap exceeded: {iterations} iterations, cap {cap}")]
    SafetyCapExceeded { iterations: usize, cap: usize },
}

/// Preference list errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreferenceError {
    #[error("Empty preference list")]
    EmptySubmission,
}
