//! Atomic JSON-file persistence for projects, batches and stats.
//!
//! One file per namespace under the store root:
//!
//! ```text
//! <root>/
//!   projects.json   # Vec<Project>
//!   batches.json    # HashMap<batch_id, BatchRecord>
//!   stats.json      # cached OverviewStats
//! ```

use log::debug;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::{BatchRecord, OverviewStats, Project};

const PROJECTS_FILE: &str = "projects.json";
const BATCHES_FILE: &str = "batches.json";
const STATS_FILE: &str = "stats.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed key-value store. All access is serialized through an
/// instance-level lock so a read-modify-write of a whole namespace is a
/// single critical section.
pub struct Store {
    root: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    /// Opens a store rooted at the given directory, creating it if
    /// needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("store opened at {:?}", root);
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
        let _guard = self.lock.lock();
        read_or_default(&self.root.join(PROJECTS_FILE))
    }

    pub fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        write_atomic(&self.root.join(PROJECTS_FILE), &projects)
    }

    /// Atomic read-modify-write over the project list.
    pub fn update_projects<R>(
        &self,
        update: impl FnOnce(&mut Vec<Project>) -> R,
    ) -> Result<R, StoreError> {
        let _guard = self.lock.lock();
        let path = self.root.join(PROJECTS_FILE);
        let mut projects: Vec<Project> = read_or_default(&path)?;
        let result = update(&mut projects);
        write_atomic(&path, &projects)?;
        Ok(result)
    }

    pub fn load_batches(&self) -> Result<HashMap<String, BatchRecord>, StoreError> {
        let _guard = self.lock.lock();
        read_or_default(&self.root.join(BATCHES_FILE))
    }

    pub fn save_batches(&self, batches: &HashMap<String, BatchRecord>) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        write_atomic(&self.root.join(BATCHES_FILE), batches)
    }

    /// Atomic read-modify-write over the batch map. Simulation ticks go
    /// through here so counters never see a torn update.
    pub fn update_batches<R>(
        &self,
        update: impl FnOnce(&mut HashMap<String, BatchRecord>) -> R,
    ) -> Result<R, StoreError> {
        let _guard = self.lock.lock();
        let path = self.root.join(BATCHES_FILE);
        let mut batches: HashMap<String, BatchRecord> = read_or_default(&path)?;
        let result = update(&mut batches);
        write_atomic(&path, &batches)?;
        Ok(result)
    }

    pub fn load_stats(&self) -> Result<Option<OverviewStats>, StoreError> {
        let _guard = self.lock.lock();
        let path = self.root.join(STATS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn save_stats(&self, stats: &OverviewStats) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        write_atomic(&self.root.join(STATS_FILE), stats)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

/// Writes JSON atomically using write-to-temp-then-rename.
fn write_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StoreError> {
    let json_string = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("tmp");
    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(json_string.as_bytes())?;
    temp_file.sync_all()?;
    fs::rename(&temp_path, path)?;

    Ok(())
}
