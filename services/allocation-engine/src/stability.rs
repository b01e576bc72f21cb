//! Stability verification
//!
//! Independent checks over a finished assignment. They do not trust the
//! engine's internal state: everything is recomputed from the proposers,
//! the branches and the allotments alone.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use types::allotment::Allotment;
use types::branch::Branch;
use types::ids::{BranchId, StudentId};
use types::priority::PriorityKey;

use crate::preferences::Proposer;

/// Why a branch would take the student over its current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    /// The branch still has an empty seat
    FreeSeat,
    /// The branch holds this student, who has worse priority
    WorseHolder(StudentId),
}

/// A student and branch that would both rather be matched to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingPair {
    pub student: StudentId,
    pub branch: BranchId,
    pub reason: BlockReason,
}

/// Every blocking pair in `allotments`
///
/// A student only blocks with branches it ranks strictly above its current
/// placement (any listed branch, if unmatched). Unknown branches in a list
/// are ignored, as the engine ignores them.
pub fn find_blocking_pairs(
    proposers: &[Proposer],
    branches: &[Branch],
    allotments: &[Allotment],
) -> Vec<BlockingPair> {
    let mut keys: HashMap<StudentId, PriorityKey> = HashMap::with_capacity(proposers.len());
    for proposer in proposers {
        keys.entry(proposer.id).or_insert_with(|| proposer.priority_key());
    }

    let mut seats: HashMap<BranchId, u32> = HashMap::with_capacity(branches.len());
    for branch in branches {
        seats.entry(branch.id).or_insert(branch.seats);
    }

    // Worst holder and head count per branch
    let mut held: HashMap<BranchId, (u32, Option<PriorityKey>)> = HashMap::new();
    let mut placement: HashMap<StudentId, BranchId> = HashMap::new();
    for allotment in allotments {
        let Some(branch) = allotment.branch() else {
            continue;
        };
        placement.insert(allotment.student, branch);
        let key = keys
            .get(&allotment.student)
            .copied()
            .unwrap_or_else(|| PriorityKey::new(allotment.student, None));
        let entry = held.entry(branch).or_insert((0, None));
        entry.0 += 1;
        entry.1 = Some(match entry.1 {
            Some(worst) if worst > key => worst,
            _ => key,
        });
    }

    let mut pairs = Vec::new();
    let mut seen = HashSet::new();
    for proposer in proposers {
        if !seen.insert(proposer.id) {
            continue;
        }
        let current = placement.get(&proposer.id).copied();
        let key = proposer.priority_key();
        let mut visited = HashSet::new();

        for branch in &proposer.preferences {
            if Some(*branch) == current {
                break;
            }
            if !visited.insert(*branch) {
                continue;
            }
            let Some(&capacity) = seats.get(branch) else {
                continue;
            };
            let (count, worst) = held.get(branch).copied().unwrap_or((0, None));

            let reason = if count < capacity {
                Some(BlockReason::FreeSeat)
            } else {
                match worst {
                    Some(w) if key.beats(&w) => Some(BlockReason::WorseHolder(w.student)),
                    _ => None,
                }
            };

            if let Some(reason) = reason {
                pairs.push(BlockingPair {
                    student: proposer.id,
                    branch: *branch,
                    reason,
                });
            }
        }
    }

    pairs
}

pub fn is_stable(proposers: &[Proposer], branches: &[Branch], allotments: &[Allotment]) -> bool {
    find_blocking_pairs(proposers, branches, allotments).is_empty()
}

/// Branches holding more students than they have seats
pub fn over_capacity(branches: &[Branch], allotments: &[Allotment]) -> Vec<BranchId> {
    let mut counts: HashMap<BranchId, u32> = HashMap::new();
    for branch in allotments.iter().filter_map(|a| a.branch()) {
        *counts.entry(branch).or_insert(0) += 1;
    }

    let mut seen = HashSet::new();
    branches
        .iter()
        .filter(|b| seen.insert(b.id))
        .filter(|b| counts.get(&b.id).copied().unwrap_or(0) > b.seats)
        .map(|b| b.id)
        .collect()
}

/// True if every distinct proposer appears exactly once
pub fn is_complete(proposers: &[Proposer], allotments: &[Allotment]) -> bool {
    let expected: HashSet<StudentId> = proposers.iter().map(|p| p.id).collect();
    let mut present = HashSet::with_capacity(allotments.len());
    for allotment in allotments {
        if !present.insert(allotment.student) {
            return false;
        }
    }
    present == expected
}
