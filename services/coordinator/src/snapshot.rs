//! Entity snapshots
//!
//! A snapshot is everything one run needs: the branches with their seats
//! and the students with their ranks and lists. Where it comes from is
//! behind [`SnapshotSource`].

use crate::error::CoordinatorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use types::branch::Branch;
use types::student::Student;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub students: Vec<Student>,
}

impl Snapshot {
    pub fn new(branches: Vec<Branch>, students: Vec<Student>) -> Self {
        Self { branches, students }
    }

    pub fn from_json(json: &str) -> Result<Self, CoordinatorError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn read_file(path: &Path) -> Result<Self, CoordinatorError> {
        let json = fs::read_to_string(path).map_err(|source| CoordinatorError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// Supplies the current entity set each time a run is triggered
pub trait SnapshotSource: Send + Sync {
    fn load(&self) -> Result<Snapshot, CoordinatorError>;
}

/// Re-reads a JSON file on every load
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSource {
    fn load(&self) -> Result<Snapshot, CoordinatorError> {
        Snapshot::read_file(&self.path)
    }
}

impl SnapshotSource for Snapshot {
    fn load(&self) -> Result<Snapshot, CoordinatorError> {
        Ok(self.clone())
    }
}
