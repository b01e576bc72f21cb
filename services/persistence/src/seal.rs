//! Result sealing
//!
//! Turns an engine's allotments into a `MatchingResult` with a fresh id and
//! a SHA-256 fingerprint over the canonical (bincode) encoding of the
//! allotments and stats. Two runs with identical outcomes seal to the same
//! fingerprint regardless of id or timestamp.

use serde::Serialize;
use sha2::{Digest, Sha256};
use types::allotment::{Allotment, MatchStats, MatchingResult};
use types::ids::ResultId;

#[derive(Serialize)]
struct Canonical<'a> {
    allotments: &'a [Allotment],
    stats: &'a MatchStats,
}

/// Hex SHA-256 over the canonical encoding. `allotments` must already be
/// sorted by student id.
pub fn fingerprint(allotments: &[Allotment], stats: &MatchStats) -> Result<String, bincode::Error> {
    let bytes = bincode::serialize(&Canonical { allotments, stats })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Seal a finished run into a storable result.
pub fn seal_result(
    mut allotments: Vec<Allotment>,
    stats: MatchStats,
    run_at: i64,
) -> Result<MatchingResult, bincode::Error> {
    allotments.sort_by_key(|a| a.student);
    let fingerprint = fingerprint(&allotments, &stats)?;
    Ok(MatchingResult {
        id: ResultId::new(),
        run_at,
        stats,
        allotments,
        fingerprint,
    })
}

/// Recompute the fingerprint and compare with the stored one
pub fn verify_fingerprint(result: &MatchingResult) -> bool {
    fingerprint(&result.allotments, &result.stats)
        .map(|computed| computed == result.fingerprint)
        .unwrap_or(false)
}
