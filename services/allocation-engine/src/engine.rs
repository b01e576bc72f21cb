//! Allocation engine core
//!
//! Student-proposing deferred acceptance. Free students propose to their
//! next branch in FIFO order; a branch keeps the best students it has seen
//! up to its seat count and sends the rest back. Acceptances stay
//! provisional until nobody is left proposing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, error, info, warn};
use types::allotment::{Allotment, MatchStats};
use types::branch::Branch;
use types::errors::EngineError;
use types::ids::{BranchId, StudentId};
use types::priority::PriorityKey;

use crate::events::{RunEvent, RunStats};
use crate::holding::{HoldDecision, Holder, HoldingSet};
use crate::outcome::{BranchFill, MatchingOutcome};
use crate::preferences::{sanitize, MalformedPreference, Proposer};

/// Extra iterations allowed on top of `students × branches`
pub const DEFAULT_SAFETY_SLACK: usize = 10;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Added to `students × branches` to form the iteration cap.
    pub safety_slack: usize,
    /// Keep a per-proposal event log in the outcome.
    pub record_events: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            safety_slack: DEFAULT_SAFETY_SLACK,
            record_events: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why no result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRunReason {
    NoProposers,
    NoReceivers,
}

impl fmt::Display for NoRunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoRunReason::NoProposers => write!(f, "no students to match"),
            NoRunReason::NoReceivers => write!(f, "no branches to match into"),
        }
    }
}

/// Result of invoking the engine
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(MatchingOutcome),
    /// Nothing to match. Expected, not an error.
    NoRun(NoRunReason),
}

impl RunOutcome {
    pub fn completed(self) -> Option<MatchingOutcome> {
        match self {
            RunOutcome::Completed(outcome) => Some(outcome),
            RunOutcome::NoRun(_) => None,
        }
    }
}

/// Per-student loop state
struct Entrant {
    id: StudentId,
    key: PriorityKey,
    /// Index into the caller's proposer slice
    source: usize,
    /// Receiver indices, cleaned
    choices: Vec<usize>,
    cursor: usize,
    held_at: Option<usize>,
}

impl Entrant {
    fn has_next(&self) -> bool {
        self.cursor < self.choices.len()
    }
}

/// Per-branch loop state
struct Seats {
    id: BranchId,
    capacity: u32,
    holding: HoldingSet,
}

/// Stable matching engine
pub struct AllocationEngine {
    config: EngineConfig,
}

impl AllocationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run deferred acceptance over a snapshot
    ///
    /// Every proposer must already carry its resolved preference list; an
    /// empty list just means the proposer stays unmatched. Returns
    /// `RunOutcome::NoRun` if either side is empty.
    pub fn run(&self, proposers: &[Proposer], receivers: &[Branch]) -> Result<RunOutcome, EngineError> {
        if proposers.is_empty() {
            info!(receivers = receivers.len(), "No students to match, skipping run");
            return Ok(RunOutcome::NoRun(NoRunReason::NoProposers));
        }
        if receivers.is_empty() {
            info!(proposers = proposers.len(), "No branches to match into, skipping run");
            return Ok(RunOutcome::NoRun(NoRunReason::NoReceivers));
        }

        let mut events = Vec::new();
        let seats = Self::index_receivers(receivers);
        let receiver_index: HashMap<BranchId, usize> =
            seats.iter().enumerate().map(|(idx, s)| (s.id, idx)).collect();
        let (mut entrants, malformed) =
            self.index_proposers(proposers, &receiver_index, &mut events);

        info!(
            students = entrants.len(),
            branches = seats.len(),
            malformed = malformed.len(),
            "Starting stable matching run"
        );

        let (seats, run_stats) = self.propose_until_settled(&mut entrants, seats, &mut events)?;
        let outcome = Self::build_outcome(proposers, &entrants, seats, malformed, run_stats, events);

        info!(
            matched = outcome.stats.total_matched,
            unmatched = outcome.stats.total_unmatched,
            unfilled = outcome.stats.total_unfilled,
            proposals = run_stats.proposals,
            evictions = run_stats.evictions,
            "Stable matching run complete"
        );

        Ok(RunOutcome::Completed(outcome))
    }

    /// The proposal loop
    fn propose_until_settled(
        &self,
        entrants: &mut [Entrant],
        mut seats: Vec<Seats>,
        events: &mut Vec<RunEvent>,
    ) -> Result<(Vec<Seats>, RunStats), EngineError> {
        let record = self.config.record_events;
        let cap = entrants
            .len()
            .saturating_mul(seats.len())
            .saturating_add(self.config.safety_slack);
        let mut stats = RunStats {
            cap,
            ..RunStats::default()
        };

        let mut free: VecDeque<usize> = VecDeque::with_capacity(entrants.len());
        for (idx, entrant) in entrants.iter().enumerate() {
            if entrant.has_next() {
                free.push_back(idx);
            } else if record {
                events.push(RunEvent::Exhausted { student: entrant.id });
            }
        }

        while let Some(p) = free.pop_front() {
            if stats.iterations >= cap {
                error!(
                    iterations = stats.iterations,
                    cap,
                    still_free = free.len() + 1,
                    "Proposal loop hit its safety cap"
                );
                return Err(EngineError::SafetyCapExceeded {
                    iterations: stats.iterations,
                    cap,
                });
            }
            stats.iterations += 1;

            let entrant = &mut entrants[p];
            let Some(&r) = entrant.choices.get(entrant.cursor) else {
                if record {
                    events.push(RunEvent::Exhausted { student: entrant.id });
                }
                continue;
            };
            entrant.cursor += 1;
            stats.proposals += 1;

            let candidate = Holder {
                key: entrant.key,
                proposer: p,
            };
            let student = entrant.id;
            let branch = seats[r].id;

            match seats[r].holding.try_hold(candidate) {
                HoldDecision::Held => {
                    entrants[p].held_at = Some(r);
                    if record {
                        events.push(RunEvent::Held {
                            student,
                            branch,
                            choice: entrants[p].cursor as u32,
                        });
                    }
                }
                HoldDecision::Displaced(evicted) => {
                    entrants[p].held_at = Some(r);
                    entrants[evicted.proposer].held_at = None;
                    stats.evictions += 1;
                    debug!(%student, %branch, evicted = %evicted.key.student, "Seat displaced");
                    if record {
                        events.push(RunEvent::Displaced {
                            student,
                            branch,
                            evicted: evicted.key.student,
                        });
                    }
                    Self::requeue(entrants, evicted.proposer, &mut free, events, record);
                }
                HoldDecision::Rejected => {
                    stats.rejections += 1;
                    if record {
                        events.push(RunEvent::Rejected { student, branch });
                    }
                    Self::requeue(entrants, p, &mut free, events, record);
                }
            }
        }

        Ok((seats, stats))
    }

    /// Put a student back in line, or retire it if its list is used up
    fn requeue(
        entrants: &[Entrant],
        p: usize,
        free: &mut VecDeque<usize>,
        events: &mut Vec<RunEvent>,
        record: bool,
    ) {
        let entrant = &entrants[p];
        if entrant.has_next() {
            free.push_back(p);
        } else {
            debug!(student = %entrant.id, "Preferences exhausted");
            if record {
                events.push(RunEvent::Exhausted { student: entrant.id });
            }
        }
    }

    /// Dense receiver table; a repeated branch id keeps its first entry
    fn index_receivers(receivers: &[Branch]) -> Vec<Seats> {
        let mut seen = HashSet::with_capacity(receivers.len());
        let mut seats = Vec::with_capacity(receivers.len());
        for branch in receivers {
            if !seen.insert(branch.id) {
                warn!(branch = %branch.id, "Duplicate branch in snapshot, keeping first");
                continue;
            }
            seats.push(Seats {
                id: branch.id,
                capacity: branch.seats,
                holding: HoldingSet::with_capacity(branch.seats as usize),
            });
        }
        seats
    }

    /// Dense proposer table with cleaned choice lists; a repeated student
    /// id keeps its first entry
    fn index_proposers(
        &self,
        proposers: &[Proposer],
        receiver_index: &HashMap<BranchId, usize>,
        events: &mut Vec<RunEvent>,
    ) -> (Vec<Entrant>, Vec<MalformedPreference>) {
        let mut seen = HashSet::with_capacity(proposers.len());
        let mut entrants = Vec::with_capacity(proposers.len());
        let mut malformed = Vec::new();

        for (source, proposer) in proposers.iter().enumerate() {
            if !seen.insert(proposer.id) {
                warn!(student = %proposer.id, "Duplicate student in snapshot, keeping first");
                continue;
            }

            let cleaned = sanitize(proposer.id, &proposer.preferences, |b| {
                receiver_index.contains_key(b)
            });
            for bad in &cleaned.malformed {
                warn!(
                    student = %bad.student,
                    branch = %bad.branch,
                    position = bad.position,
                    "Skipping preference for unknown branch"
                );
                if self.config.record_events {
                    events.push(RunEvent::MalformedPreferenceSkipped {
                        student: bad.student,
                        branch: bad.branch,
                    });
                }
            }
            if cleaned.duplicates > 0 {
                debug!(
                    student = %proposer.id,
                    duplicates = cleaned.duplicates,
                    "Dropped repeated preference entries"
                );
            }
            malformed.extend(cleaned.malformed);

            entrants.push(Entrant {
                id: proposer.id,
                key: proposer.priority_key(),
                source,
                choices: cleaned.kept.iter().map(|b| receiver_index[b]).collect(),
                cursor: 0,
                held_at: None,
            });
        }

        (entrants, malformed)
    }

    fn build_outcome(
        proposers: &[Proposer],
        entrants: &[Entrant],
        seats: Vec<Seats>,
        malformed: Vec<MalformedPreference>,
        run_stats: RunStats,
        events: Vec<RunEvent>,
    ) -> MatchingOutcome {
        let mut allotments: Vec<Allotment> = entrants
            .iter()
            .map(|entrant| match entrant.held_at {
                Some(r) => {
                    let branch = seats[r].id;
                    let rank = proposers[entrant.source].rank_of(branch);
                    Allotment::matched(entrant.id, branch, rank)
                }
                None => Allotment::unmatched(entrant.id),
            })
            .collect();
        allotments.sort_by_key(|a| a.student);

        let total_seats: u64 = seats.iter().map(|s| u64::from(s.capacity)).sum();
        let stats = MatchStats::tally(&allotments, total_seats);

        let branch_fills = seats
            .into_iter()
            .map(|s| {
                debug_assert!(s.holding.len() <= s.capacity as usize);
                BranchFill {
                    branch: s.id,
                    seats: s.capacity,
                    students: s
                        .holding
                        .into_ranked()
                        .into_iter()
                        .map(|h| h.key.student)
                        .collect(),
                }
            })
            .collect();

        MatchingOutcome {
            allotments,
            stats,
            branch_fills,
            malformed,
            run_stats,
            events,
        }
    }
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(id: u64, seats: u32) -> Branch {
        Branch::new(BranchId::new(id), format!("College {id}"), "Branch", seats)
    }

    fn proposer(id: u64, rank: Option<u32>, prefs: &[u64]) -> Proposer {
        Proposer::new(
            StudentId::new(id),
            rank,
            prefs.iter().copied().map(BranchId::new).collect(),
        )
    }

    fn run(proposers: &[Proposer], branches: &[Branch]) -> MatchingOutcome {
        AllocationEngine::default()
            .run(proposers, branches)
            .unwrap()
            .completed()
            .expect("expected a completed run")
    }

    #[test]
    fn test_better_rank_wins_single_seat() {
        let outcome = run(
            &[proposer(1, Some(1), &[10]), proposer(2, Some(2), &[10])],
            &[branch(10, 1)],
        );

        let first = outcome.allotment_for(StudentId::new(1)).unwrap();
        assert_eq!(first.branch(), Some(BranchId::new(10)));
        assert!(!outcome.allotment_for(StudentId::new(2)).unwrap().is_matched());
        assert_eq!(outcome.stats.total_matched, 1);
        assert_eq!(outcome.stats.total_unmatched, 1);
        assert_eq!(outcome.stats.total_unfilled, 0);
    }

    #[test]
    fn test_single_student_gets_first_choice() {
        let outcome = run(&[proposer(1, Some(3), &[10, 20])], &[branch(10, 1), branch(20, 1)]);

        let allotment = outcome.allotment_for(StudentId::new(1)).unwrap();
        assert_eq!(allotment.branch(), Some(BranchId::new(10)));
        assert_eq!(allotment.preference_rank(), Some(1));
        assert_eq!(outcome.stats.total_unfilled, 1);
        assert_eq!(outcome.stats.total_unmatched, 0);
        assert_eq!(outcome.fill_for(BranchId::new(20)).unwrap().empty(), 1);
    }

    #[test]
    fn test_no_students_is_no_run() {
        let result = AllocationEngine::default().run(&[], &[branch(1, 3)]).unwrap();
        assert_eq!(result, RunOutcome::NoRun(NoRunReason::NoProposers));
    }

    #[test]
    fn test_no_branches_is_no_run() {
        let result = AllocationEngine::default()
            .run(&[proposer(1, Some(1), &[])], &[])
            .unwrap();
        assert_eq!(result, RunOutcome::NoRun(NoRunReason::NoReceivers));
    }

    #[test]
    fn test_capacity_two_keeps_best_two() {
        let outcome = run(
            &[
                proposer(1, Some(5), &[10]),
                proposer(2, Some(1), &[10]),
                proposer(3, Some(9), &[10]),
            ],
            &[branch(10, 2)],
        );

        let fill = outcome.fill_for(BranchId::new(10)).unwrap();
        assert_eq!(fill.students, vec![StudentId::new(2), StudentId::new(1)]);
        assert!(!outcome.allotment_for(StudentId::new(3)).unwrap().is_matched());
    }

    #[test]
    fn test_evicted_student_moves_to_next_choice() {
        // Student 1 proposes first and is held at 10, then displaced by 2.
        let outcome = run(
            &[proposer(1, Some(7), &[10, 20]), proposer(2, Some(3), &[10])],
            &[branch(10, 1), branch(20, 1)],
        );

        let moved = outcome.allotment_for(StudentId::new(1)).unwrap();
        assert_eq!(moved.branch(), Some(BranchId::new(20)));
        assert_eq!(moved.preference_rank(), Some(2));
        assert_eq!(outcome.run_stats.evictions, 1);
    }

    #[test]
    fn test_empty_preference_list_is_unmatched() {
        let outcome = run(&[proposer(1, Some(1), &[])], &[branch(10, 1)]);
        assert!(!outcome.allotment_for(StudentId::new(1)).unwrap().is_matched());
        assert_eq!(outcome.run_stats.proposals, 0);
    }

    #[test]
    fn test_zero_capacity_branch_holds_nobody() {
        let outcome = run(&[proposer(1, Some(1), &[10, 20])], &[branch(10, 0), branch(20, 1)]);
        assert_eq!(
            outcome.allotment_for(StudentId::new(1)).unwrap().branch(),
            Some(BranchId::new(20))
        );
        assert_eq!(outcome.fill_for(BranchId::new(10)).unwrap().filled(), 0);
    }

    #[test]
    fn test_unknown_branch_is_skipped_and_reported() {
        let outcome = run(&[proposer(1, Some(1), &[99, 10])], &[branch(10, 1)]);

        let allotment = outcome.allotment_for(StudentId::new(1)).unwrap();
        assert_eq!(allotment.branch(), Some(BranchId::new(10)));
        // Rank refers to the list as submitted
        assert_eq!(allotment.preference_rank(), Some(2));
        assert_eq!(outcome.malformed.len(), 1);
        assert_eq!(outcome.malformed[0].branch, BranchId::new(99));
    }

    #[test]
    fn test_duplicate_preference_not_reproposed() {
        let outcome = run(
            &[proposer(1, Some(9), &[10, 10, 10]), proposer(2, Some(1), &[10])],
            &[branch(10, 1)],
        );
        assert!(!outcome.allotment_for(StudentId::new(1)).unwrap().is_matched());
        assert_eq!(outcome.run_stats.proposals, 2);
    }

    #[test]
    fn test_duplicate_student_counted_once() {
        let outcome = run(
            &[proposer(1, Some(1), &[10]), proposer(1, Some(1), &[10])],
            &[branch(10, 2)],
        );
        assert_eq!(outcome.allotments.len(), 1);
        assert_eq!(outcome.stats.total_unfilled, 1);
    }

    #[test]
    fn test_unranked_student_loses_to_ranked() {
        let outcome = run(
            &[proposer(1, None, &[10]), proposer(2, Some(500_000), &[10])],
            &[branch(10, 1)],
        );
        assert!(outcome.allotment_for(StudentId::new(2)).unwrap().is_matched());
        assert!(!outcome.allotment_for(StudentId::new(1)).unwrap().is_matched());
    }

    #[test]
    fn test_equal_rank_lower_id_wins() {
        let outcome = run(
            &[proposer(8, Some(4), &[10]), proposer(3, Some(4), &[10])],
            &[branch(10, 1)],
        );
        assert!(outcome.allotment_for(StudentId::new(3)).unwrap().is_matched());
        assert!(!outcome.allotment_for(StudentId::new(8)).unwrap().is_matched());
    }

    #[test]
    fn test_allotments_sorted_by_student() {
        let outcome = run(
            &[
                proposer(30, Some(1), &[10]),
                proposer(10, Some(2), &[10]),
                proposer(20, Some(3), &[10]),
            ],
            &[branch(10, 3)],
        );
        let ids: Vec<u64> = outcome.allotments.iter().map(|a| a.student.get()).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_event_log_records_displacement() {
        let engine = AllocationEngine::new(EngineConfig {
            record_events: true,
            ..EngineConfig::new()
        });
        let outcome = engine
            .run(
                &[proposer(1, Some(7), &[10]), proposer(2, Some(3), &[10])],
                &[branch(10, 1)],
            )
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(
            outcome.events,
            vec![
                RunEvent::Held {
                    student: StudentId::new(1),
                    branch: BranchId::new(10),
                    choice: 1,
                },
                RunEvent::Displaced {
                    student: StudentId::new(2),
                    branch: BranchId::new(10),
                    evicted: StudentId::new(1),
                },
                RunEvent::Exhausted { student: StudentId::new(1) },
            ]
        );
    }

    #[test]
    fn test_events_off_by_default() {
        let outcome = run(&[proposer(1, Some(1), &[10])], &[branch(10, 1)]);
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.run_stats.proposals, 1);
    }

    #[test]
    fn test_cap_covers_full_preference_lists() {
        // Worst case: everyone lists every branch and one seat per branch.
        let branches: Vec<Branch> = (1..=6).map(|id| branch(id, 1)).collect();
        let all: Vec<u64> = (1..=6).collect();
        let proposers: Vec<Proposer> = (1..=12)
            .map(|id| proposer(id, Some(id as u32), &all))
            .collect();

        let outcome = run(&proposers, &branches);
        assert!(outcome.run_stats.iterations <= outcome.run_stats.cap);
        assert_eq!(outcome.stats.total_matched, 6);
        assert_eq!(outcome.stats.total_unmatched, 6);
    }
}
