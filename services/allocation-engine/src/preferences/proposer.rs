//! Engine-side view of a student
//!
//! The engine never deals with "missing" preferences. Callers resolve a
//! student that submitted nothing to the default order first, via
//! [`default_preference_order`] and [`Proposer::from_student`].

use serde::{Deserialize, Serialize};
use types::branch::Branch;
use types::ids::{BranchId, StudentId};
use types::priority::PriorityKey;
use types::student::Student;

/// A student with a fully resolved preference list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposer {
    pub id: StudentId,
    pub air_rank: Option<u32>,
    /// Most preferred first. Empty means the student applies nowhere.
    pub preferences: Vec<BranchId>,
}

impl Proposer {
    pub fn new(id: StudentId, air_rank: Option<u32>, preferences: Vec<BranchId>) -> Self {
        Self {
            id,
            air_rank,
            preferences,
        }
    }

    /// Resolve a stored student, falling back to `default_order` when the
    /// student never submitted a list
    pub fn from_student(student: &Student, default_order: &[BranchId]) -> Self {
        let preferences = if student.has_submitted() {
            student.preferences.clone()
        } else {
            default_order.to_vec()
        };
        Self::new(student.id, student.air_rank, preferences)
    }

    pub fn priority_key(&self) -> PriorityKey {
        PriorityKey::new(self.id, self.air_rank)
    }

    /// 1-based position of `branch` in this proposer's list (first
    /// occurrence), or `None` if the branch is not listed
    pub fn rank_of(&self, branch: BranchId) -> Option<u32> {
        self.preferences
            .iter()
            .position(|b| *b == branch)
            .map(|idx| idx as u32 + 1)
    }
}

/// Default preference order: every branch, ascending by id
pub fn default_preference_order(branches: &[Branch]) -> Vec<BranchId> {
    let mut ids: Vec<BranchId> = branches.iter().map(|b| b.id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Resolve every student against the same default order
pub fn resolve_proposers(students: &[Student], branches: &[Branch]) -> Vec<Proposer> {
    let default_order = default_preference_order(branches);
    students
        .iter()
        .map(|s| Proposer::from_student(s, &default_order))
        .collect()
}
