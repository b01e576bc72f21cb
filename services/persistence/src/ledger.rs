//! In-memory result ledger
//!
//! The append-only list of every published result plus the index of the
//! active one. Both the live store and journal recovery drive the same
//! ledger, so replaying a journal reproduces exactly what was published.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use types::allotment::MatchingResult;
use types::ids::ResultId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Result {0} was already published")]
    DuplicateResult(ResultId),

    #[error("Result {0} is not in the ledger")]
    UnknownResult(ResultId),
}

#[derive(Debug, Clone, Default)]
pub struct ResultLedger {
    /// Publication order, oldest first
    results: Vec<Arc<MatchingResult>>,
    index: HashMap<ResultId, usize>,
    active: Option<usize>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `result` and make it the active one.
    pub fn publish(&mut self, result: MatchingResult) -> Result<Arc<MatchingResult>, LedgerError> {
        self.check_new(&result.id)?;
        let result = Arc::new(result);
        let position = self.results.len();
        self.index.insert(result.id, position);
        self.results.push(Arc::clone(&result));
        self.active = Some(position);
        Ok(result)
    }

    /// Point the active marker at an already published result.
    pub fn activate(&mut self, id: ResultId) -> Result<Arc<MatchingResult>, LedgerError> {
        let position = *self.index.get(&id).ok_or(LedgerError::UnknownResult(id))?;
        self.active = Some(position);
        Ok(Arc::clone(&self.results[position]))
    }

    pub fn check_new(&self, id: &ResultId) -> Result<(), LedgerError> {
        if self.index.contains_key(id) {
            return Err(LedgerError::DuplicateResult(*id));
        }
        Ok(())
    }

    pub fn contains(&self, id: &ResultId) -> bool {
        self.index.contains_key(id)
    }

    pub fn active(&self) -> Option<Arc<MatchingResult>> {
        self.active.map(|position| Arc::clone(&self.results[position]))
    }

    pub fn get(&self, id: &ResultId) -> Option<Arc<MatchingResult>> {
        self.index
            .get(id)
            .map(|&position| Arc::clone(&self.results[position]))
    }

    /// Every result, newest first
    pub fn history(&self) -> Vec<Arc<MatchingResult>> {
        self.results.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::allotment::{Allotment, MatchStats};
    use types::ids::StudentId;

    fn result(run_at: i64) -> MatchingResult {
        let allotments = vec![Allotment::unmatched(StudentId::new(1))];
        MatchingResult {
            id: ResultId::new(),
            run_at,
            stats: MatchStats::tally(&allotments, 0),
            allotments,
            fingerprint: String::new(),
        }
    }

    #[test]
    fn test_publish_makes_result_active() {
        let mut ledger = ResultLedger::new();
        assert!(ledger.active().is_none());

        let first = ledger.publish(result(1)).unwrap();
        assert_eq!(ledger.active().unwrap().id, first.id);

        let second = ledger.publish(result(2)).unwrap();
        assert_eq!(ledger.active().unwrap().id, second.id);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut ledger = ResultLedger::new();
        let ids: Vec<ResultId> = (1..=3).map(|t| ledger.publish(result(t)).unwrap().id).collect();

        let history: Vec<ResultId> = ledger.history().iter().map(|r| r.id).collect();
        assert_eq!(history, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_activate_older_result() {
        let mut ledger = ResultLedger::new();
        let old = ledger.publish(result(1)).unwrap();
        ledger.publish(result(2)).unwrap();

        ledger.activate(old.id).unwrap();
        assert_eq!(ledger.active().unwrap().id, old.id);
        // History is untouched by activation
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_duplicate_and_unknown_ids_rejected() {
        let mut ledger = ResultLedger::new();
        let r = result(1);
        let id = r.id;
        ledger.publish(r.clone()).unwrap();

        assert_eq!(ledger.publish(r).unwrap_err(), LedgerError::DuplicateResult(id));
        let stranger = ResultId::new();
        assert_eq!(
            ledger.activate(stranger).unwrap_err(),
            LedgerError::UnknownResult(stranger)
        );
        assert_eq!(ledger.active().unwrap().id, id);
    }
}
