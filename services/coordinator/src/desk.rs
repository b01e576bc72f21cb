//! Allotment desk
//!
//! The administrative entry point: load the current snapshot, run the
//! engine, seal and publish the result. One run at a time; a trigger that
//! arrives while a run is in flight is turned away rather than queued.

use crate::error::CoordinatorError;
use crate::snapshot::SnapshotSource;
use allocation_engine::{resolve_proposers, AllocationEngine, BranchFill, NoRunReason, RunOutcome};
use chrono::Utc;
use persistence::{seal_result, ResultStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{info, warn};
use types::allotment::{Allotment, MatchingResult};
use types::ids::{ResultId, StudentId};
use types::priority::PriorityKey;

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed {
        result_id: ResultId,
        matched: u64,
        unmatched: u64,
        unfilled: u64,
        /// Preference entries skipped because they named unknown branches
        malformed: usize,
    },
    /// Nothing to match; the active result is left alone
    NoRun(NoRunReason),
}

pub struct AllotmentDesk {
    source: Box<dyn SnapshotSource>,
    engine: AllocationEngine,
    store: Arc<ResultStore>,
    run_guard: Mutex<()>,
}

impl AllotmentDesk {
    pub fn new(source: Box<dyn SnapshotSource>, engine: AllocationEngine, store: Arc<ResultStore>) -> Self {
        Self {
            source,
            engine,
            store,
            run_guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Run a matching over the current snapshot and publish it.
    pub fn run_matching_now(&self) -> Result<TriggerOutcome, CoordinatorError> {
        let _running = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            // A panicked run leaves nothing half-published, the store swaps atomically
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("Matching trigger rejected, a run is already in progress");
                return Err(CoordinatorError::RunInProgress);
            }
        };

        let snapshot = self.source.load()?;
        info!(
            students = snapshot.students.len(),
            branches = snapshot.branches.len(),
            "Snapshot loaded"
        );

        let proposers = resolve_proposers(&snapshot.students, &snapshot.branches);
        let outcome = match self.engine.run(&proposers, &snapshot.branches)? {
            RunOutcome::Completed(outcome) => outcome,
            RunOutcome::NoRun(reason) => {
                info!(%reason, "Matching skipped, active result unchanged");
                return Ok(TriggerOutcome::NoRun(reason));
            }
        };

        let malformed = outcome.malformed.len();
        let run_at = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let result = seal_result(outcome.allotments, outcome.stats, run_at).map_err(StoreError::from)?;
        let published = self.store.publish(result)?;

        let stats = published.stats;
        info!(
            result = %published.id,
            matched = stats.total_matched,
            unmatched = stats.total_unmatched,
            unfilled = stats.total_unfilled,
            malformed,
            fingerprint = %published.fingerprint,
            "Matching run published"
        );

        Ok(TriggerOutcome::Completed {
            result_id: published.id,
            matched: stats.total_matched,
            unmatched: stats.total_unmatched,
            unfilled: stats.total_unfilled,
            malformed,
        })
    }

    pub fn active_result(&self) -> Result<Option<Arc<MatchingResult>>, CoordinatorError> {
        Ok(self.store.active()?)
    }

    /// Every stored result, newest first
    pub fn history(&self) -> Result<Vec<Arc<MatchingResult>>, CoordinatorError> {
        Ok(self.store.history()?)
    }

    pub fn allotment_for(&self, student: StudentId) -> Result<Option<Allotment>, CoordinatorError> {
        Ok(self.store.allotment_for(student)?)
    }

    /// Re-point the active result at an earlier run.
    pub fn activate(&self, id: ResultId) -> Result<(), CoordinatorError> {
        let at = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.store.activate(id, at)?;
        Ok(())
    }

    /// Seat usage per branch in the active result, measured against the
    /// current snapshot's branches. Empty when nothing has been published.
    pub fn branch_fills(&self) -> Result<Vec<BranchFill>, CoordinatorError> {
        let Some(active) = self.store.active()? else {
            return Ok(Vec::new());
        };
        let snapshot = self.source.load()?;

        let keys: HashMap<StudentId, PriorityKey> = snapshot
            .students
            .iter()
            .rev()
            .map(|s| (s.id, s.priority_key()))
            .collect();

        let mut seen = HashSet::new();
        let fills = snapshot
            .branches
            .iter()
            .filter(|b| seen.insert(b.id))
            .map(|branch| {
                let mut admitted: Vec<StudentId> = active.students_in(branch.id).map(|a| a.student).collect();
                admitted.sort_by_key(|s| keys.get(s).copied().unwrap_or_else(|| PriorityKey::new(*s, None)));
                BranchFill {
                    branch: branch.id,
                    seats: branch.seats,
                    students: admitted,
                }
            })
            .collect();
        Ok(fills)
    }
}
