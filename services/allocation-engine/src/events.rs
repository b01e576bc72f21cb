//! Event structures for the allocation engine
//!
//! Emitted during a run when `EngineConfig::record_events` is set. The
//! sequence is deterministic, so two runs over the same input produce the
//! same event log.

use serde::{Deserialize, Serialize};
use types::ids::{BranchId, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    /// Student took a spare seat
    Held {
        student: StudentId,
        branch: BranchId,
        /// 1-based position of `branch` in the student's cleaned list
        choice: u32,
    },
    /// Student took the seat of a worse holder
    Displaced {
        student: StudentId,
        branch: BranchId,
        evicted: StudentId,
    },
    /// Branch was full of better students
    Rejected { student: StudentId, branch: BranchId },
    /// Student ran out of branches and stays unmatched
    Exhausted { student: StudentId },
    /// Preference entry named an unknown branch and was skipped
    MalformedPreferenceSkipped {
        student: StudentId,
        branch: BranchId,
    },
}

impl RunEvent {
    /// Student the event is about
    pub fn student(&self) -> StudentId {
        match *self {
            RunEvent::Held { student, .. }
            | RunEvent::Displaced { student, .. }
            | RunEvent::Rejected { student, .. }
            | RunEvent::Exhausted { student }
            | RunEvent::MalformedPreferenceSkipped { student, .. } => student,
        }
    }
}

/// Loop counters, always collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub iterations: usize,
    pub proposals: usize,
    pub evictions: usize,
    pub rejections: usize,
    /// Iteration bound that was in force for the run
    pub cap: usize,
}
