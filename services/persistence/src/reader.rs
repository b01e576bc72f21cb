//! Journal Reader: Sequential reader with corruption detection
//!
//! Reads every `results-*.journal` file in index order, validating the
//! CRC32C of each entry. Reading stops at the first entry that cannot be
//! trusted: everything before it is the valid prefix, everything from it
//! on is reported in the corruption log.

use crate::journal::{list_journal_files, JournalEntry, JournalError};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Checksum mismatch in {file:?} at byte offset {offset}: entry seq={sequence}")]
    ChecksumMismatch {
        file: PathBuf,
        offset: u64,
        sequence: u64,
    },

    #[error("Corruption detected in {file:?} at byte offset {offset}: {detail}")]
    Corruption {
        file: PathBuf,
        offset: u64,
        detail: String,
    },

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },
}

// ── Corruption Log Entry ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CorruptionKind {
    ChecksumMismatch,
    TruncatedEntry,
    Unparseable,
}

/// Where and why reading stopped early
#[derive(Debug, Clone)]
pub struct CorruptionRecord {
    pub file: PathBuf,
    /// Byte offset within `file` of the first untrusted entry
    pub byte_offset: u64,
    pub kind: CorruptionKind,
    pub detail: String,
}

// ── Journal Reader ──────────────────────────────────────────────────

/// One journal file held in memory
struct LoadedFile {
    path: PathBuf,
    bytes: Vec<u8>,
    cursor: usize,
}

pub struct JournalReader {
    /// Files not yet loaded, oldest first
    pending: VecDeque<PathBuf>,
    newest: Option<PathBuf>,
    current: Option<LoadedFile>,
    last_sequence: Option<u64>,
    corruption_log: Vec<CorruptionRecord>,
}

impl JournalReader {
    /// Open a reader over all journal files in `dir`. A missing directory
    /// reads as an empty journal.
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let pending: VecDeque<PathBuf> = list_journal_files(dir)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        Ok(Self {
            newest: pending.back().cloned(),
            pending,
            current: None,
            last_sequence: None,
            corruption_log: Vec::new(),
        })
    }

    /// Next checksum-valid entry, or `None` at the end of the journal.
    ///
    /// The first bad frame is logged and returned as an error; from then on
    /// the reader yields `None`.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        if !self.corruption_log.is_empty() {
            return Ok(None);
        }
        let Some(file) = self.file_with_data()? else {
            return Ok(None);
        };

        let offset = file.cursor as u64;
        let decoded = JournalEntry::from_bytes(&file.bytes[file.cursor..]);
        let (record, error) = match decoded {
            Ok((entry, used)) if entry.verify_checksum() => {
                file.cursor += used;
                self.last_sequence = Some(entry.sequence);
                return Ok(Some(entry));
            }
            Ok((entry, _)) => (
                CorruptionRecord {
                    file: file.path.clone(),
                    byte_offset: offset,
                    kind: CorruptionKind::ChecksumMismatch,
                    detail: format!("stored crc {:#010x} does not match seq={}", entry.checksum, entry.sequence),
                },
                ReaderError::ChecksumMismatch {
                    file: file.path.clone(),
                    offset,
                    sequence: entry.sequence,
                },
            ),
            Err(err) => {
                let kind = match err {
                    JournalError::Truncated { .. } => CorruptionKind::TruncatedEntry,
                    _ => CorruptionKind::Unparseable,
                };
                let detail = err.to_string();
                (
                    CorruptionRecord {
                        file: file.path.clone(),
                        byte_offset: offset,
                        kind,
                        detail: detail.clone(),
                    },
                    ReaderError::Corruption {
                        file: file.path.clone(),
                        offset,
                        detail,
                    },
                )
            }
        };
        self.corruption_log.push(record);
        Err(error)
    }

    /// Every entry, or the first corruption as an error.
    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The trusted prefix plus whatever corruption ended it. Only IO
    /// failures are errors here.
    pub fn recover_entries(&mut self) -> Result<(Vec<JournalEntry>, Vec<CorruptionRecord>), ReaderError> {
        let mut entries = Vec::new();
        loop {
            match self.next_entry() {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break,
                Err(ReaderError::ChecksumMismatch { .. } | ReaderError::Corruption { .. }) => break,
                Err(other) => return Err(other),
            }
        }
        Ok((entries, self.corruption_log.clone()))
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn corruption_log(&self) -> &[CorruptionRecord] {
        &self.corruption_log
    }

    /// True if `record` points into the newest journal file
    pub fn corruption_is_at_tail(&self, record: &CorruptionRecord) -> bool {
        self.newest.as_ref() == Some(&record.file)
    }

    /// Sequences must run 1, 2, 3, ... with nothing skipped.
    pub fn validate_sequences(entries: &[JournalEntry]) -> Result<(), ReaderError> {
        for (expected, entry) in (1u64..).zip(entries) {
            if entry.sequence != expected {
                return Err(ReaderError::SequenceGap {
                    expected,
                    got: entry.sequence,
                });
            }
        }
        Ok(())
    }

    /// The loaded file with unread bytes, loading later files as needed
    fn file_with_data(&mut self) -> Result<Option<&mut LoadedFile>, ReaderError> {
        while self
            .current
            .as_ref()
            .map_or(true, |f| f.cursor >= f.bytes.len())
        {
            let Some(path) = self.pending.pop_front() else {
                return Ok(None);
            };
            let bytes = fs::read(&path)?;
            self.current = Some(LoadedFile {
                path,
                bytes,
                cursor: 0,
            });
        }
        Ok(self.current.as_mut())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
