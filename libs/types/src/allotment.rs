//! Matching outcome records
//!
//! A `MatchingResult` is the terminal snapshot of one matching run. Results
//! are historical records: once sealed they are never edited, and a newer
//! run produces a new result rather than updating an old one.

use crate::ids::{BranchId, ResultId, StudentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a student ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Placement {
    Matched {
        branch: BranchId,
        /// 1-based position of `branch` in the student's preference list.
        /// `None` if the branch was not in the list.
        preference_rank: Option<u32>,
    },
    Unmatched,
}

/// One student's outcome within a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allotment {
    pub student: StudentId,
    pub placement: Placement,
}

impl Allotment {
    pub fn matched(student: StudentId, branch: BranchId, preference_rank: Option<u32>) -> Self {
        Self {
            student,
            placement: Placement::Matched {
                branch,
                preference_rank,
            },
        }
    }

    pub fn unmatched(student: StudentId) -> Self {
        Self {
            student,
            placement: Placement::Unmatched,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self.placement, Placement::Matched { .. })
    }

    pub fn branch(&self) -> Option<BranchId> {
        match self.placement {
            Placement::Matched { branch, .. } => Some(branch),
            Placement::Unmatched => None,
        }
    }

    pub fn preference_rank(&self) -> Option<u32> {
        match self.placement {
            Placement::Matched { preference_rank, .. } => preference_rank,
            Placement::Unmatched => None,
        }
    }
}

/// Aggregate counts for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchStats {
    pub total_matched: u64,
    pub total_unmatched: u64,
    /// Total seats minus matched students
    pub total_unfilled: u64,
    pub total_seats: u64,
}

impl MatchStats {
    /// Derive the counts from a set of allotments and the seat total
    pub fn tally(allotments: &[Allotment], total_seats: u64) -> Self {
        let total_matched = allotments.iter().filter(|a| a.is_matched()).count() as u64;
        let total_unmatched = allotments.len() as u64 - total_matched;
        Self {
            total_matched,
            total_unmatched,
            total_unfilled: total_seats.saturating_sub(total_matched),
            total_seats,
        }
    }
}

/// Stored result of one stable matching run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub id: ResultId,
    /// Unix nanos at which the run was sealed
    pub run_at: i64,
    pub stats: MatchStats,
    /// Exactly one entry per student, sorted by student id
    pub allotments: Vec<Allotment>,
    /// Hex SHA-256 over the canonical allotment set
    pub fingerprint: String,
}

impl MatchingResult {
    /// Look up a single student's allotment
    pub fn allotment_for(&self, student: StudentId) -> Option<&Allotment> {
        self.allotments
            .binary_search_by_key(&student, |a| a.student)
            .ok()
            .map(|idx| &self.allotments[idx])
    }

    /// Students matched to `branch`, in student id order
    pub fn students_in(&self, branch: BranchId) -> impl Iterator<Item = &Allotment> + '_ {
        self.allotments
            .iter()
            .filter(move |a| a.branch() == Some(branch))
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &Allotment> + '_ {
        self.allotments.iter().filter(|a| !a.is_matched())
    }

    pub fn run_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.run_at)
    }
}
