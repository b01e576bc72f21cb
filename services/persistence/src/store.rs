//! Result Store: Append-only result log with an atomic active pointer
//!
//! Readers take the read side of one `RwLock` and see the whole ledger at
//! once, so they observe either the old active result or the new one and
//! never a state with zero or two. When a journal is configured every
//! change is written and flushed before it becomes visible in memory.

use crate::journal::{JournalConfig, JournalError, JournalWriter, RecordKind};
use crate::ledger::{LedgerError, ResultLedger};
use crate::recovery::{recover_ledger, RecoveryError};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};
use types::allotment::{Allotment, MatchingResult};
use types::ids::{ResultId, StudentId};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

// ── Result Store ────────────────────────────────────────────────────

pub struct ResultStore {
    ledger: RwLock<ResultLedger>,
    /// Held for the whole of a write so journal order matches ledger order
    journal: Option<Mutex<JournalWriter>>,
}

impl ResultStore {
    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            ledger: RwLock::new(ResultLedger::new()),
            journal: None,
        }
    }

    /// Open a journal-backed store, replaying whatever the journal holds.
    pub fn open(config: JournalConfig) -> Result<Self, StoreError> {
        let recovered = recover_ledger(&config.dir)?;
        let mut writer = JournalWriter::open(config)?;
        writer.set_next_sequence(recovered.next_sequence);

        info!(
            results = recovered.ledger.len(),
            next_sequence = recovered.next_sequence,
            "Result store opened"
        );

        Ok(Self {
            ledger: RwLock::new(recovered.ledger),
            journal: Some(Mutex::new(writer)),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    /// Append `result` and make it the active one in a single step.
    pub fn publish(&self, result: MatchingResult) -> Result<Arc<MatchingResult>, StoreError> {
        let mut journal = self.lock_journal()?;
        self.read()?.check_new(&result.id)?;

        if let Some(writer) = journal.as_deref_mut() {
            let payload = bincode::serialize(&result)?;
            let entry = writer.write_record(RecordKind::ResultPublished, result.run_at, payload)?;
            debug!(sequence = entry.sequence, result = %result.id, "Journaled result");
        }

        let published = self.write()?.publish(result)?;
        info!(
            result = %published.id,
            matched = published.stats.total_matched,
            unmatched = published.stats.total_unmatched,
            "Result published and active"
        );
        Ok(published)
    }

    /// Make an older result active again. `at` is the Unix nanos recorded
    /// in the journal.
    pub fn activate(&self, id: ResultId, at: i64) -> Result<Arc<MatchingResult>, StoreError> {
        let mut journal = self.lock_journal()?;
        if !self.read()?.contains(&id) {
            return Err(LedgerError::UnknownResult(id).into());
        }

        if let Some(writer) = journal.as_deref_mut() {
            let payload = bincode::serialize(&id)?;
            writer.write_record(RecordKind::ResultActivated, at, payload)?;
        }

        let active = self.write()?.activate(id)?;
        info!(result = %id, "Result re-activated");
        Ok(active)
    }

    pub fn active(&self) -> Result<Option<Arc<MatchingResult>>, StoreError> {
        Ok(self.read()?.active())
    }

    /// Every result ever published, newest first
    pub fn history(&self) -> Result<Vec<Arc<MatchingResult>>, StoreError> {
        Ok(self.read()?.history())
    }

    pub fn get(&self, id: &ResultId) -> Result<Option<Arc<MatchingResult>>, StoreError> {
        Ok(self.read()?.get(id))
    }

    /// The student's allotment in the active result
    pub fn allotment_for(&self, student: StudentId) -> Result<Option<Allotment>, StoreError> {
        Ok(self
            .read()?
            .active()
            .and_then(|result| result.allotment_for(student).copied()))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn read(&self) -> Result<RwLockReadGuard<'_, ResultLedger>, StoreError> {
        self.ledger.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ResultLedger>, StoreError> {
        self.ledger.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn lock_journal(&self) -> Result<Option<std::sync::MutexGuard<'_, JournalWriter>>, StoreError> {
        self.journal
            .as_ref()
            .map(|m| m.lock().map_err(|_| StoreError::LockPoisoned))
            .transpose()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seal::seal_result;
    use std::thread;
    use tempfile::TempDir;
    use types::allotment::MatchStats;
    use types::ids::BranchId;

    fn sealed(matched: u64) -> MatchingResult {
        let allotments: Vec<Allotment> = (1..=3)
            .map(|s| {
                if s <= matched {
                    Allotment::matched(StudentId::new(s), BranchId::new(9), Some(1))
                } else {
                    Allotment::unmatched(StudentId::new(s))
                }
            })
            .collect();
        let stats = MatchStats::tally(&allotments, 3);
        seal_result(allotments, stats, matched as i64).unwrap()
    }

    #[test]
    fn test_publish_swaps_active() {
        let store = ResultStore::in_memory();
        assert!(store.active().unwrap().is_none());

        let first = store.publish(sealed(1)).unwrap();
        let second = store.publish(sealed(2)).unwrap();

        assert_eq!(store.active().unwrap().unwrap().id, second.id);
        let history: Vec<ResultId> = store.history().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(history, vec![second.id, first.id]);
    }

    #[test]
    fn test_allotment_lookup_reads_active_result() {
        let store = ResultStore::in_memory();
        assert!(store.allotment_for(StudentId::new(1)).unwrap().is_none());

        store.publish(sealed(0)).unwrap();
        assert!(!store.allotment_for(StudentId::new(1)).unwrap().unwrap().is_matched());

        store.publish(sealed(1)).unwrap();
        assert!(store.allotment_for(StudentId::new(1)).unwrap().unwrap().is_matched());
    }

    #[test]
    fn test_duplicate_publish_rejected() {
        let store = ResultStore::in_memory();
        let result = sealed(1);
        store.publish(result.clone()).unwrap();
        assert!(matches!(
            store.publish(result),
            Err(StoreError::Ledger(LedgerError::DuplicateResult(_)))
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_reopen_restores_state() {
        let tmp = TempDir::new().unwrap();
        let (first, second) = {
            let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
            assert!(store.is_durable());
            let first = store.publish(sealed(1)).unwrap();
            let second = store.publish(sealed(2)).unwrap();
            store.activate(first.id, 99).unwrap();
            (first, second)
        };

        let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.active().unwrap().unwrap().id, first.id);
        assert_eq!(*store.get(&second.id).unwrap().unwrap(), *second);

        // Sequences continue after recovery
        let third = store.publish(sealed(3)).unwrap();
        drop(store);
        let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
        assert_eq!(store.active().unwrap().unwrap().id, third.id);
    }

    #[test]
    fn test_activate_unknown_is_not_journaled() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
        store.publish(sealed(1)).unwrap();
        assert!(store.activate(ResultId::new(), 5).is_err());
        drop(store);

        let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_readers_always_see_one_active_result() {
        let store = Arc::new(ResultStore::in_memory());
        store.publish(sealed(0)).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..50 {
                    store.publish(sealed(n % 4)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        assert!(store.active().unwrap().is_some());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.len().unwrap(), 51);
    }
}
