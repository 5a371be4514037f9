use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use market_core::AlertEvent;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::Group;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Group not found: {0}")]
    GroupNotFound(String),
}

/// Durable state rooted at a data directory:
///
/// ```text
/// groups/<group_id>.json
/// monitors/<group_id>/<symbol_key>.json
/// alerts_history/<YYYY-MM-DD>.jsonl
/// ```
///
/// Every document write goes through write-temp-then-rename so concurrent
/// readers always see a consistent snapshot.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("groups"))?;
        fs::create_dir_all(root.join("monitors"))?;
        fs::create_dir_all(root.join("alerts_history"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_path(&self, group_id: &str) -> PathBuf {
        self.root
            .join("groups")
            .join(format!("{}.json", sanitize(group_id)))
    }

    fn monitor_dir(&self, group_id: &str) -> PathBuf {
        self.root.join("monitors").join(sanitize(group_id))
    }

    fn monitor_path(&self, group_id: &str, symbol_key: &str) -> PathBuf {
        self.monitor_dir(group_id)
            .join(format!("{}.json", sanitize(symbol_key)))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    // --- groups ---

    pub fn save_group(&self, group: &Group) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(group)?;
        self.write_atomic(&self.group_path(&group.id), &bytes)
    }

    pub fn load_group(&self, group_id: &str) -> Result<Group, StoreError> {
        let path = self.group_path(group_id);
        if !path.exists() {
            return Err(StoreError::GroupNotFound(group_id.to_string()));
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All persisted groups, sorted by id. Unreadable files are logged and
    /// skipped rather than failing the whole load.
    pub fn load_groups(&self) -> Result<Vec<Group>, StoreError> {
        let mut groups = Vec::new();
        for entry in fs::read_dir(self.root.join("groups"))? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match fs::read(&path).map_err(StoreError::from).and_then(|bytes| {
                serde_json::from_slice::<Group>(&bytes).map_err(StoreError::from)
            }) {
                Ok(group) => groups.push(group),
                Err(err) => {
                    tracing::warn!("Skipping unreadable group file {:?}: {}", path, err);
                }
            }
        }
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    /// Delete a group together with its monitor state.
    pub fn delete_group(&self, group_id: &str) -> Result<(), StoreError> {
        let path = self.group_path(group_id);
        if !path.exists() {
            return Err(StoreError::GroupNotFound(group_id.to_string()));
        }
        fs::remove_file(path)?;

        let monitors = self.monitor_dir(group_id);
        if monitors.exists() {
            fs::remove_dir_all(monitors)?;
        }
        Ok(())
    }

    // --- monitor state ---

    pub fn save_monitor<T: Serialize>(
        &self,
        group_id: &str,
        symbol_key: &str,
        state: &T,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(self.monitor_dir(group_id))?;
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_atomic(&self.monitor_path(group_id, symbol_key), &bytes)
    }

    pub fn load_monitor<T: DeserializeOwned>(
        &self,
        group_id: &str,
        symbol_key: &str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.monitor_path(group_id, symbol_key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn delete_monitor(&self, group_id: &str, symbol_key: &str) -> Result<(), StoreError> {
        let path = self.monitor_path(group_id, symbol_key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    // --- alert history ---

    /// Append one event to the day's history file. The log is append-only;
    /// retention is the operator's business.
    pub fn append_alert(&self, date: NaiveDate, event: &AlertEvent) -> Result<(), StoreError> {
        let path = self
            .root
            .join("alerts_history")
            .join(format!("{}.jsonl", date.format("%Y-%m-%d")));
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Read back one day of alert history.
    pub fn load_alerts(&self, date: NaiveDate) -> Result<Vec<AlertEvent>, StoreError> {
        let path = self
            .root
            .join("alerts_history")
            .join(format!("{}.jsonl", date.format("%Y-%m-%d")));
        if !path.exists() {
            return Ok(vec![]);
        }

        let content = fs::read_to_string(path)?;
        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }
}

/// Keep file names portable: anything outside [A-Za-z0-9._-] becomes '_'.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
