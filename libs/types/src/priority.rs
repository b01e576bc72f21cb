//! Merit-rank priority ordering
//!
//! Every branch ranks students the same way: by All India Rank, lower is
//! better. A student without a rank sorts after every ranked student.
//! Equal ranks fall back to the student id, lower id first, so the order
//! is total and a run never depends on collection iteration order.

use crate::ids::StudentId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Total ordering key used by branches to compare students
///
/// `Ord` is "better first": `a < b` means `a` is preferred over `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriorityKey {
    pub air_rank: Option<u32>,
    pub student: StudentId,
}

impl PriorityKey {
    pub fn new(student: StudentId, air_rank: Option<u32>) -> Self {
        Self { air_rank, student }
    }

    /// True if `self` is strictly preferred over `other`
    pub fn beats(&self, other: &PriorityKey) -> bool {
        self < other
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = match (self.air_rank, other.air_rank) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_rank.then_with(|| self.student.cmp(&other.student))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
