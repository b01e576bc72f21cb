//! Branch entity
//!
//! A college + branch combination with a fixed number of seats.

use crate::ids::BranchId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub branch: String,
    /// Seat capacity. Zero is legal: such a branch never admits anyone.
    pub seats: u32,
}

impl Branch {
    pub fn new(id: BranchId, college: impl Into<String>, branch: impl Into<String>, seats: u32) -> Self {
        Self {
            id,
            college: college.into(),
            branch: branch.into(),
            seats,
        }
    }

    /// Human-readable "College - Branch" label
    pub fn label(&self) -> String {
        format!("{} - {}", self.college, self.branch)
    }
}

/// Sum of seats across all branches
pub fn total_seats(branches: &[Branch]) -> u64 {
    branches.iter().map(|b| u64::from(b.seats)).sum()
}
