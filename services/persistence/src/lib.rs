//! Result Persistence Service
//!
//! Keeps every matching result ever published, exactly one of them active,
//! optionally backed by an append-only journal with per-entry checksums so
//! the log survives restarts.
//!
//! # Modules
//! - `journal`: binary entry format and the rotating writer
//! - `reader`: sequential reader that stops at the first corrupt entry
//! - `ledger`: in-memory result log plus active pointer
//! - `recovery`: journal replay into a ledger
//! - `seal`: result ids and fingerprints
//! - `store`: the thread-safe `ResultStore`

pub mod journal;
pub mod reader;
pub mod ledger;
pub mod recovery;
pub mod seal;
pub mod store;

pub use journal::{FsyncPolicy, JournalConfig};
pub use ledger::LedgerError;
pub use seal::{fingerprint, seal_result};
pub use store::{ResultStore, StoreError};
