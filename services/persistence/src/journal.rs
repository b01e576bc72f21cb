//! Result journal
//!
//! Every change to the result log is one record: publishing a result
//! (which also makes it active) or re-activating an older one. Records are
//! framed, checksummed and appended to `results-NNNNNN.journal` files.
//!
//! # Frame layout
//! ```text
//! body_len     u32   bytes that follow this field
//! sequence     u64
//! timestamp    i64   Unix nanos
//! kind         u8
//! payload_len  u32
//! payload      [u8; payload_len]
//! crc          u32   CRC32C of sequence..payload
//! ```
//! All integers little endian.

use crc32c::{crc32c, crc32c_append};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, warn};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame cut short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown record kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("Out of order append: expected seq {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },

    #[error("Journal writer disabled: a failed append could not be rolled back")]
    WriterFailed,
}

/// sequence + timestamp + kind + payload_len + crc
const FRAME_OVERHEAD: usize = 8 + 8 + 1 + 4 + 4;

/// A body this large can only be garbage
const MAX_BODY_LEN: usize = 256 * 1024 * 1024;

// ── Record Kinds ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    /// Payload: bincode `MatchingResult`. The result becomes active.
    ResultPublished = 1,
    /// Payload: bincode `ResultId` of an already published result.
    ResultActivated = 2,
}

impl RecordKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, JournalError> {
        match byte {
            1 => Ok(RecordKind::ResultPublished),
            2 => Ok(RecordKind::ResultActivated),
            other => Err(JournalError::UnknownKind(other)),
        }
    }
}

// ── Journal Entry ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Gapless, starting at 1
    pub sequence: u64,
    /// Unix nanos supplied by the caller, never read from the clock here
    pub timestamp: i64,
    pub kind: RecordKind,
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(sequence: u64, timestamp: i64, kind: RecordKind, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, kind, &payload);
        Self {
            sequence,
            timestamp,
            kind,
            payload,
            checksum,
        }
    }

    pub fn compute_checksum(sequence: u64, timestamp: i64, kind: RecordKind, payload: &[u8]) -> u32 {
        let crc = crc32c(&sequence.to_le_bytes());
        let crc = crc32c_append(crc, &timestamp.to_le_bytes());
        let crc = crc32c_append(crc, &[kind.as_byte()]);
        crc32c_append(crc, payload)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, self.kind, &self.payload)
    }

    /// Size of the encoded frame including the length prefix
    pub fn encoded_len(&self) -> usize {
        4 + FRAME_OVERHEAD + self.payload.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut frame);
        frame
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let body_len = (FRAME_OVERHEAD + self.payload.len()) as u32;
        out.extend(body_len.to_le_bytes());
        out.extend(self.sequence.to_le_bytes());
        out.extend(self.timestamp.to_le_bytes());
        out.push(self.kind.as_byte());
        out.extend((self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.extend(self.checksum.to_le_bytes());
    }

    /// Decode one frame from the front of `data`.
    ///
    /// Returns the entry and the number of bytes it occupied. The checksum
    /// is carried over as stored; call [`verify_checksum`](Self::verify_checksum).
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        let mut frame = FrameCursor::new(data);
        let body_len = frame.u32()? as usize;
        if !(FRAME_OVERHEAD..=MAX_BODY_LEN).contains(&body_len) {
            return Err(JournalError::Malformed(format!("body length {} out of range", body_len)));
        }
        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Truncated {
                need: total,
                have: data.len(),
            });
        }

        let sequence = frame.u64()?;
        let timestamp = frame.u64()? as i64;
        let kind = RecordKind::from_byte(frame.take(1)?[0])?;
        let payload_len = frame.u32()? as usize;
        if FRAME_OVERHEAD + payload_len != body_len {
            return Err(JournalError::Malformed(format!(
                "payload of {} bytes in a {} byte body",
                payload_len, body_len
            )));
        }
        let payload = frame.take(payload_len)?.to_vec();
        let checksum = frame.u32()?;

        let entry = Self {
            sequence,
            timestamp,
            kind,
            payload,
            checksum,
        };
        Ok((entry, total))
    }
}

/// Forward-only reader over a frame
struct FrameCursor<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> FrameCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, at: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], JournalError> {
        let end = self.at + n;
        let bytes = self.data.get(self.at..end).ok_or(JournalError::Truncated {
            need: end,
            have: self.data.len(),
        })?;
        self.at = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32, JournalError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64, JournalError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// When appended frames are pushed to stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    EveryWrite,
    /// Only when a file is sealed by rotation or on [`JournalWriter::sync`]
    OnRotation,
}

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// A file at or past this size is closed and a new one started
    pub max_file_size: u64,
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    /// 64 MiB files, fsync on every write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// The file currently being appended to
struct Segment {
    index: u64,
    path: PathBuf,
    file: File,
    len: u64,
}

impl Segment {
    fn open(dir: &Path, index: u64) -> Result<Self, io::Error> {
        let path = journal_path(dir, index);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { index, path, file, len })
    }
}

pub struct JournalWriter {
    config: JournalConfig,
    segment: Segment,
    next_sequence: u64,
    /// Reused encode buffer
    scratch: Vec<u8>,
    /// Set when torn bytes could not be cut off; every later append fails
    failed: bool,
}

impl JournalWriter {
    /// Open the newest journal file in `config.dir` for appending, creating
    /// the directory and the first file if needed.
    ///
    /// Sequencing restarts at 1; after recovery, move it on with
    /// [`set_next_sequence`](Self::set_next_sequence).
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;
        let newest = list_journal_files(&config.dir)?
            .last()
            .map(|(idx, _)| *idx)
            .unwrap_or(0);
        let segment = Segment::open(&config.dir, newest)?;

        Ok(Self {
            config,
            segment,
            next_sequence: 1,
            scratch: Vec::new(),
            failed: false,
        })
    }

    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_file_path(&self) -> &Path {
        &self.segment.path
    }

    /// Append a prepared entry. Its sequence must be the next one.
    ///
    /// A failed write or sync is rolled back to the last complete frame, so
    /// an unacknowledged record never sits in front of later ones.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if self.failed {
            return Err(JournalError::WriterFailed);
        }
        if entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }
        if self.segment.len >= self.config.max_file_size {
            self.rotate()?;
        }

        self.scratch.clear();
        entry.encode_into(&mut self.scratch);
        if let Err(err) = self.write_frame() {
            self.roll_back(entry.sequence);
            return Err(err.into());
        }

        self.segment.len += self.scratch.len() as u64;
        self.next_sequence += 1;
        Ok(())
    }

    /// Write the encoded frame in `scratch` at the end of the last good frame.
    fn write_frame(&mut self) -> Result<(), io::Error> {
        let on_disk = self.segment.file.metadata()?.len();
        if on_disk < self.segment.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("journal file shrank to {} bytes, expected {}", on_disk, self.segment.len),
            ));
        }
        if on_disk > self.segment.len {
            warn!(
                file = %self.segment.path.display(),
                expected = self.segment.len,
                found = on_disk,
                "Cutting partial frame before append"
            );
            self.segment.file.set_len(self.segment.len)?;
        }

        // One write per frame so a crash tears at most the last frame
        self.segment.file.write_all(&self.scratch)?;
        if self.config.fsync_policy == FsyncPolicy::EveryWrite {
            self.segment.file.sync_data()?;
        }
        Ok(())
    }

    fn roll_back(&mut self, sequence: u64) {
        if let Err(err) = self.segment.file.set_len(self.segment.len) {
            error!(
                file = %self.segment.path.display(),
                sequence,
                error = %err,
                "Could not cut failed append, journal writer disabled"
            );
            self.failed = true;
        }
    }

    /// Frame `payload` with the next sequence number and append it.
    pub fn write_record(
        &mut self,
        kind: RecordKind,
        timestamp: i64,
        payload: Vec<u8>,
    ) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::new(self.next_sequence, timestamp, kind, payload);
        self.append(&entry)?;
        Ok(entry)
    }

    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.segment.file.sync_all()?;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;
        self.segment = Segment::open(&self.config.dir, self.segment.index + 1)?;
        Ok(())
    }
}

// ── File Naming ─────────────────────────────────────────────────────

pub(crate) fn journal_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("results-{:06}.journal", index))
}

pub(crate) fn parse_journal_index(name: &str) -> Option<u64> {
    name.strip_prefix("results-")?
        .strip_suffix(".journal")?
        .parse::<u64>()
        .ok()
}

/// Journal files in `dir`, ordered by index. A missing directory has none.
pub(crate) fn list_journal_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, io::Error> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        if let Some(idx) = parse_journal_index(&dirent.file_name().to_string_lossy()) {
            files.push((idx, dirent.path()));
        }
    }
    files.sort_unstable_by_key(|(idx, _)| *idx);
    Ok(files)
}

// ── Tests ───────────────────────────────────────────────────────────
