//! Holding set for a single branch
//!
//! Holds the students a branch has provisionally accepted, bounded by its
//! seat count. Holders sit in a max-heap keyed by priority, so the worst
//! holder (the eviction candidate) is always at the top.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use types::priority::PriorityKey;

/// A provisionally accepted student
///
/// `proposer` is the engine's dense index for the student. Ordering is by
/// priority key only; a greater holder is a worse one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holder {
    pub key: PriorityKey,
    pub proposer: usize,
}

impl Ord for Holder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for Holder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What happened to a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldDecision {
    /// A spare seat was taken
    Held,
    /// The branch was full and the returned holder was evicted to make room
    Displaced(Holder),
    /// The branch was full of better students (or has no seats)
    Rejected,
}

#[derive(Debug, Clone)]
pub struct HoldingSet {
    capacity: usize,
    held: BinaryHeap<Holder>,
}

impl HoldingSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            held: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Offer a seat to `candidate`
    ///
    /// With a spare seat the candidate is held outright. Otherwise it
    /// replaces the worst holder only if it is strictly better.
    pub fn try_hold(&mut self, candidate: Holder) -> HoldDecision {
        if self.held.len() < self.capacity {
            self.held.push(candidate);
            return HoldDecision::Held;
        }

        if let Some(mut worst) = self.held.peek_mut() {
            if candidate.key.beats(&worst.key) {
                // heap is re-sifted when `worst` drops
                let evicted = std::mem::replace(&mut *worst, candidate);
                return HoldDecision::Displaced(evicted);
            }
        }
        HoldDecision::Rejected
    }

    /// The holder that would be evicted next
    pub fn worst(&self) -> Option<&Holder> {
        self.held.peek()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.held.len() >= self.capacity
    }

    /// Seats not yet taken
    pub fn spare(&self) -> usize {
        self.capacity - self.held.len()
    }

    /// Current holders in arbitrary order
    pub fn holders(&self) -> impl Iterator<Item = &Holder> + '_ {
        self.held.iter()
    }

    /// Current holders, best first
    pub fn into_ranked(self) -> Vec<Holder> {
        self.held.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::StudentId;

    fn holder(idx: usize, rank: Option<u32>) -> Holder {
        Holder {
            key: PriorityKey::new(StudentId::new(idx as u64), rank),
            proposer: idx,
        }
    }

    #[test]
    fn test_holds_until_full() {
        let mut set = HoldingSet::with_capacity(2);
        assert_eq!(set.try_hold(holder(1, Some(50))), HoldDecision::Held);
        assert_eq!(set.try_hold(holder(2, Some(10))), HoldDecision::Held);

        assert!(set.is_full());
        assert_eq!(set.spare(), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_worst_is_highest_rank() {
        let mut set = HoldingSet::with_capacity(3);
        set.try_hold(holder(1, Some(5)));
        set.try_hold(holder(2, Some(9)));
        set.try_hold(holder(3, Some(1)));

        assert_eq!(set.worst().unwrap().proposer, 2);
    }

    #[test]
    fn test_better_candidate_displaces_worst() {
        let mut set = HoldingSet::with_capacity(2);
        set.try_hold(holder(1, Some(5)));
        set.try_hold(holder(2, Some(9)));

        let decision = set.try_hold(holder(3, Some(1)));
        assert_eq!(decision, HoldDecision::Displaced(holder(2, Some(9))));

        let ranked: Vec<_> = set.into_ranked().iter().map(|h| h.proposer).collect();
        assert_eq!(ranked, vec![3, 1]);
    }

    #[test]
    fn test_worse_candidate_rejected() {
        let mut set = HoldingSet::with_capacity(1);
        set.try_hold(holder(1, Some(5)));

        assert_eq!(set.try_hold(holder(2, Some(6))), HoldDecision::Rejected);
        assert_eq!(set.try_hold(holder(3, None)), HoldDecision::Rejected);
        assert_eq!(set.worst().unwrap().proposer, 1);
    }

    #[test]
    fn test_equal_rank_tie_goes_to_lower_id() {
        let mut set = HoldingSet::with_capacity(1);
        set.try_hold(holder(7, Some(3)));

        // Same rank, lower id: strictly better
        assert!(matches!(set.try_hold(holder(4, Some(3))), HoldDecision::Displaced(h) if h.proposer == 7));
        // Same rank, higher id: rejected
        assert_eq!(set.try_hold(holder(8, Some(3))), HoldDecision::Rejected);
    }

    #[test]
    fn test_zero_capacity_never_holds() {
        let mut set = HoldingSet::with_capacity(0);
        assert_eq!(set.try_hold(holder(1, Some(1))), HoldDecision::Rejected);
        assert!(set.is_empty());
        assert!(set.is_full());
    }

    #[test]
    fn test_unranked_holder_is_displaced_by_ranked() {
        let mut set = HoldingSet::with_capacity(1);
        set.try_hold(holder(1, None));
        assert!(matches!(set.try_hold(holder(2, Some(900_000))), HoldDecision::Displaced(_)));
    }
}
