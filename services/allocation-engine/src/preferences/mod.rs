//! Preference resolution module
//!
//! Turns stored students into proposers with explicit, clean preference
//! lists before the engine sees them.

pub mod proposer;
pub mod sanitize;

pub use proposer::{default_preference_order, resolve_proposers, Proposer};
pub use sanitize::{normalize_submission, sanitize, MalformedPreference, SanitizedPreferences};
