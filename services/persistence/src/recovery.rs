//! Recovery Flow: Rebuild the result ledger from the journal
//!
//! Recovery process:
//! 1. Read the valid prefix of the journal
//! 2. A corrupt tail in the newest file is cut off so appends stay clean;
//!    corruption anywhere earlier aborts recovery
//! 3. Validate that sequences are gapless from 1
//! 4. Replay each record into a fresh `ResultLedger`, re-checking every
//!    result's fingerprint

use crate::journal::{JournalEntry, RecordKind};
use crate::ledger::{LedgerError, ResultLedger};
use crate::reader::{CorruptionRecord, JournalReader, ReaderError};
use crate::seal::verify_fingerprint;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use types::allotment::MatchingResult;
use types::ids::ResultId;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Corrupt journal before the newest file: {0:?}")]
    CorruptHistory(CorruptionRecord),

    #[error("Cannot decode payload of seq={sequence}: {source}")]
    Decode {
        sequence: u64,
        #[source]
        source: bincode::Error,
    },

    #[error("Fingerprint mismatch for result {id} at seq={sequence}")]
    FingerprintMismatch { sequence: u64, id: ResultId },

    #[error("Ledger rejected seq={sequence}: {source}")]
    Ledger {
        sequence: u64,
        #[source]
        source: LedgerError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Recovery Report ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct Recovered {
    pub ledger: ResultLedger,
    /// Sequence the writer must use next
    pub next_sequence: u64,
    pub replayed: u64,
    /// Tail records dropped during recovery
    pub truncated: Vec<CorruptionRecord>,
    pub elapsed_ms: u64,
}

/// Rebuild the ledger from the journal files in `dir`.
pub fn recover_ledger(dir: &Path) -> Result<Recovered, RecoveryError> {
    let started = Instant::now();
    let mut reader = JournalReader::open(dir)?;
    let (entries, corruption) = reader.recover_entries()?;

    for record in &corruption {
        if !reader.corruption_is_at_tail(record) {
            return Err(RecoveryError::CorruptHistory(record.clone()));
        }
        warn!(
            file = %record.file.display(),
            offset = record.byte_offset,
            detail = %record.detail,
            "Dropping corrupt journal tail"
        );
        truncate_at(&record.file, record.byte_offset)?;
    }

    JournalReader::validate_sequences(&entries)?;

    let mut ledger = ResultLedger::new();
    for entry in &entries {
        apply_entry(&mut ledger, entry)?;
    }

    let recovered = Recovered {
        next_sequence: entries.last().map(|e| e.sequence + 1).unwrap_or(1),
        replayed: entries.len() as u64,
        ledger,
        truncated: corruption,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        replayed = recovered.replayed,
        results = recovered.ledger.len(),
        elapsed_ms = recovered.elapsed_ms,
        "Result journal recovered"
    );
    Ok(recovered)
}

/// Apply one journal record to the ledger.
pub fn apply_entry(ledger: &mut ResultLedger, entry: &JournalEntry) -> Result<(), RecoveryError> {
    let sequence = entry.sequence;
    let ledger_err = |source| RecoveryError::Ledger { sequence, source };

    match entry.kind {
        RecordKind::ResultPublished => {
            let result: MatchingResult = bincode::deserialize(&entry.payload)
                .map_err(|source| RecoveryError::Decode { sequence, source })?;
            if !verify_fingerprint(&result) {
                return Err(RecoveryError::FingerprintMismatch { sequence, id: result.id });
            }
            ledger.publish(result).map_err(ledger_err)?;
        }
        RecordKind::ResultActivated => {
            let id: ResultId = bincode::deserialize(&entry.payload)
                .map_err(|source| RecoveryError::Decode { sequence, source })?;
            ledger.activate(id).map_err(ledger_err)?;
        }
    }
    Ok(())
}

fn truncate_at(path: &Path, offset: u64) -> Result<(), std::io::Error> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(offset)?;
    file.sync_all()
}

// ── Tests ───────────────────────────────────────────────────────────
