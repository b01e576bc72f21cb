//! Preference list cleanup
//!
//! A list may name branches that do not exist (stale or hand-edited data)
//! or repeat a branch. Unknown entries are skipped and reported; repeats
//! keep their first position. Neither aborts a run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use types::branch::Branch;
use types::errors::PreferenceError;
use types::ids::{BranchId, StudentId};

/// A preference entry naming a branch that is not in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MalformedPreference {
    pub student: StudentId,
    pub branch: BranchId,
    /// 1-based position of the entry in the submitted list
    pub position: u32,
}

/// A list reduced to known, distinct branches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedPreferences {
    pub kept: Vec<BranchId>,
    pub malformed: Vec<MalformedPreference>,
    pub duplicates: usize,
}

/// Drop unknown and repeated branch ids, preserving order
pub fn sanitize<F>(student: StudentId, list: &[BranchId], is_known: F) -> SanitizedPreferences
where
    F: Fn(&BranchId) -> bool,
{
    let mut seen = HashSet::with_capacity(list.len());
    let mut out = SanitizedPreferences {
        kept: Vec::with_capacity(list.len()),
        ..SanitizedPreferences::default()
    };

    for (idx, branch) in list.iter().enumerate() {
        if !is_known(branch) {
            out.malformed.push(MalformedPreference {
                student,
                branch: *branch,
                position: idx as u32 + 1,
            });
            continue;
        }
        if seen.insert(*branch) {
            out.kept.push(*branch);
        } else {
            out.duplicates += 1;
        }
    }

    out
}

/// Validate a freshly submitted ordering
///
/// Ids that name no branch are dropped, repeats collapse to their first
/// position. A submission that is empty before or after cleanup is
/// rejected.
pub fn normalize_submission(
    ordered_ids: &[BranchId],
    branches: &[Branch],
) -> Result<Vec<BranchId>, PreferenceError> {
    if ordered_ids.is_empty() {
        return Err(PreferenceError::EmptySubmission);
    }

    let known: HashSet<BranchId> = branches.iter().map(|b| b.id).collect();
    // The submitter has no id yet at this layer; positions are all we report.
    let cleaned = sanitize(StudentId::new(0), ordered_ids, |b| known.contains(b));

    if cleaned.kept.is_empty() {
        return Err(PreferenceError::EmptySubmission);
    }
    Ok(cleaned.kept)
}
