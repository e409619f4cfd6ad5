//! Local switch metadata store
//!
//! The only thing persisted on disk: `{switch_id → metadata}` as pretty
//! JSON. Titles, intervals, guardian and recipient keys, status. All
//! cryptographic material lives on the relay network; none of it ever
//! lands here.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::switch::{Switch, SwitchId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("switch not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    switches: HashMap<String, Switch>,
}

/// File-backed store of switch metadata.
#[derive(Debug)]
pub struct SwitchStore {
    path: PathBuf,
    switches: HashMap<String, Switch>,
}

impl SwitchStore {
    /// Load the store, starting empty if the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let switches = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<StoreFile>(&contents)?.switches,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, switches })
    }

    /// Persist to disk: write a sibling temp file, then rename over the
    /// old one so a crash never leaves a half-written store.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = StoreFile {
            switches: self.switches.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn insert(&mut self, switch: Switch) {
        self.switches.insert(switch.id.to_string(), switch);
    }

    pub fn get(&self, id: &SwitchId) -> Option<&Switch> {
        self.switches.get(&id.to_string())
    }

    pub fn get_mut(&mut self, id: &SwitchId) -> Option<&mut Switch> {
        self.switches.get_mut(&id.to_string())
    }

    pub fn remove(&mut self, id: &SwitchId) -> Result<Switch, StoreError> {
        self.switches
            .remove(&id.to_string())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Switch> {
        self.switches.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Switch> {
        self.switches.values_mut()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
