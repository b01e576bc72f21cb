//! Coordinator configuration
//!
//! Built from the command line (snapshot path) and the environment
//! (`ALLOTMENT_JOURNAL_DIR`). Without a journal directory results live in
//! memory only.

use crate::error::CoordinatorError;
use allocation_engine::EngineConfig;
use persistence::JournalConfig;
use std::path::PathBuf;

pub const JOURNAL_DIR_ENV: &str = "ALLOTMENT_JOURNAL_DIR";

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// JSON file holding `{ "branches": [...], "students": [...] }`
    pub snapshot_path: PathBuf,
    pub journal_dir: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl CoordinatorConfig {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            journal_dir: None,
            engine: EngineConfig::new(),
        }
    }

    /// Read the process arguments and environment.
    pub fn from_env() -> Result<Self, CoordinatorError> {
        Self::from_parts(std::env::args().skip(1), std::env::var(JOURNAL_DIR_ENV).ok())
    }

    /// `args` excludes the program name.
    pub fn from_parts<I>(args: I, journal_dir: Option<String>) -> Result<Self, CoordinatorError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let snapshot_path = args
            .next()
            .ok_or_else(|| CoordinatorError::Usage("allotment-coordinator <snapshot.json>".into()))?;
        if let Some(extra) = args.next() {
            return Err(CoordinatorError::Usage(format!("unexpected argument {:?}", extra)));
        }

        Ok(Self {
            journal_dir: journal_dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from),
            ..Self::new(snapshot_path)
        })
    }

    pub fn journal_config(&self) -> Option<JournalConfig> {
        self.journal_dir.clone().map(JournalConfig::new)
    }
}
