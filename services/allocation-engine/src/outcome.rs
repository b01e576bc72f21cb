//! Completed run output
//!
//! `MatchingOutcome` is what the engine hands back. It is plain data: the
//! caller decides whether and how to persist it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::allotment::{Allotment, MatchStats};
use types::ids::{BranchId, StudentId};

use crate::events::{RunEvent, RunStats};
use crate::preferences::MalformedPreference;

/// Seat usage of one branch after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFill {
    pub branch: BranchId,
    pub seats: u32,
    /// Admitted students, best priority first
    pub students: Vec<StudentId>,
}

impl BranchFill {
    pub fn filled(&self) -> u32 {
        self.students.len() as u32
    }

    pub fn empty(&self) -> u32 {
        self.seats.saturating_sub(self.filled())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingOutcome {
    /// One entry per distinct student, sorted by student id
    pub allotments: Vec<Allotment>,
    pub stats: MatchStats,
    /// One entry per distinct branch, in input order
    pub branch_fills: Vec<BranchFill>,
    pub malformed: Vec<MalformedPreference>,
    pub run_stats: RunStats,
    /// Empty unless event recording was enabled
    pub events: Vec<RunEvent>,
}

impl MatchingOutcome {
    pub fn allotment_for(&self, student: StudentId) -> Option<&Allotment> {
        self.allotments
            .binary_search_by_key(&student, |a| a.student)
            .ok()
            .map(|idx| &self.allotments[idx])
    }

    pub fn fill_for(&self, branch: BranchId) -> Option<&BranchFill> {
        self.branch_fills.iter().find(|f| f.branch == branch)
    }

    /// Number of matched students per preference rank (1 = first choice)
    ///
    /// Matches whose branch is absent from the student's list are not
    /// counted.
    pub fn rank_distribution(&self) -> BTreeMap<u32, u64> {
        let mut dist = BTreeMap::new();
        for rank in self.allotments.iter().filter_map(|a| a.preference_rank()) {
            *dist.entry(rank).or_insert(0) += 1;
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_fill_counts() {
        let fill = BranchFill {
            branch: BranchId::new(1),
            seats: 3,
            students: vec![StudentId::new(4), StudentId::new(2)],
        };
        assert_eq!(fill.filled(), 2);
        assert_eq!(fill.empty(), 1);
    }

    #[test]
    fn test_rank_distribution() {
        let allotments = vec![
            Allotment::matched(StudentId::new(1), BranchId::new(1), Some(1)),
            Allotment::matched(StudentId::new(2), BranchId::new(1), Some(1)),
            Allotment::matched(StudentId::new(3), BranchId::new(2), Some(3)),
            Allotment::matched(StudentId::new(4), BranchId::new(2), None),
            Allotment::unmatched(StudentId::new(5)),
        ];
        let outcome = MatchingOutcome {
            stats: MatchStats::tally(&allotments, 4),
            allotments,
            branch_fills: Vec::new(),
            malformed: Vec::new(),
            run_stats: RunStats::default(),
            events: Vec::new(),
        };

        let dist = outcome.rank_distribution();
        assert_eq!(dist.get(&1), Some(&2));
        assert_eq!(dist.get(&3), Some(&1));
        assert_eq!(dist.len(), 2);
    }
}
