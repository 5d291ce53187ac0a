use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{FavoriteRecord, Group, GroupSummary};

/// Group collection file name in the data directory
const GROUPS_FILE: &str = "groups.json";

/// Current on-disk format. Bump when the layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct GroupFile {
    format_version: u32,
    saved_at: DateTime<Utc>,
    groups: BTreeMap<String, Group>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    format_version: Option<u32>,
}

/// Durable collection of named groups.
///
/// Every mutation rewrites the whole file before returning; if the write
/// fails, the in-memory change is rolled back so memory and disk agree.
pub struct GroupStore {
    path: PathBuf,
    groups: BTreeMap<String, Group>,
}

impl GroupStore {
    /// Open the store in `data_dir`. A missing or unreadable file yields an
    /// empty collection.
    pub fn open(data_dir: &Path) -> Self {
        let mut store = Self {
            path: data_dir.join(GROUPS_FILE),
            groups: BTreeMap::new(),
        };
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory collection with what is on disk.
    pub fn load(&mut self) {
        self.groups = match std::fs::read_to_string(&self.path) {
            Ok(contents) => match Self::decode(&contents) {
                Ok(groups) => {
                    debug!(count = groups.len(), "Loaded groups");
                    groups
                }
                Err(reason) => {
                    warn!(path = %self.path.display(), %reason, "Group file unreadable, starting empty");
                    self.set_aside();
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read group file, starting empty");
                BTreeMap::new()
            }
        };
    }

    fn decode(contents: &str) -> std::result::Result<BTreeMap<String, Group>, String> {
        let probe: VersionProbe = serde_json::from_str(contents).map_err(|e| e.to_string())?;
        match probe.format_version {
            Some(FORMAT_VERSION) => {}
            Some(other) => return Err(format!("unsupported format version {}", other)),
            None => return Err("missing format version".to_string()),
        }
        let file: GroupFile = serde_json::from_str(contents).map_err(|e| e.to_string())?;

        for (key, group) in &file.groups {
            if key != &group.name {
                return Err(format!("group stored under '{}' is named '{}'", key, group.name));
            }
        }
        Ok(file.groups)
    }

    /// Keep a copy of an unreadable file so the next persist does not destroy it.
    fn set_aside(&self) {
        let backup = self.path.with_extension("json.corrupt");
        match std::fs::copy(&self.path, &backup) {
            Ok(_) => info!(backup = %backup.display(), "Saved unreadable group file"),
            Err(e) => warn!(error = %e, "Failed to copy unreadable group file"),
        }
    }

    /// Write the whole collection: temp file, fsync, rename.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = GroupFile {
            format_version: FORMAT_VERSION,
            saved_at: Utc::now(),
            groups: self.groups.clone(),
        };
        let contents = serde_json::to_vec_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&contents)?;
        temp.sync_all()?;
        drop(temp);
        std::fs::rename(&temp_path, &self.path)?;

        debug!(count = self.groups.len(), "Persisted groups");
        Ok(())
    }

    // ===== Queries =====

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn records(&self, name: &str) -> Result<Vec<FavoriteRecord>> {
        self.groups
            .get(name)
            .map(|g| g.records.clone())
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    /// Name and size of every group, ordered by name.
    pub fn list(&self) -> Vec<GroupSummary> {
        self.groups.values().map(Group::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // ===== Mutations =====

    pub fn create(&mut self, name: &str) -> Result<Group> {
        if name.trim().is_empty() {
            return Err(Error::InvalidGroupName(name.to_string()));
        }
        if self.groups.contains_key(name) {
            return Err(Error::DuplicateGroup(name.to_string()));
        }

        let group = Group::new(name);
        self.groups.insert(name.to_string(), group.clone());
        if let Err(e) = self.persist() {
            self.groups.remove(name);
            return Err(e);
        }

        info!(group = %name, "Created group");
        Ok(group)
    }

    /// Remove a group. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let Some(removed) = self.groups.remove(name) else {
            return Ok(false);
        };
        if let Err(e) = self.persist() {
            self.groups.insert(name.to_string(), removed);
            return Err(e);
        }

        info!(group = %name, "Deleted group");
        Ok(true)
    }

    /// Overwrite a group's records with a snapshot.
    pub fn replace_records(&mut self, name: &str, records: Vec<FavoriteRecord>) -> Result<&Group> {
        let group = self
            .groups
            .get_mut(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))?;
        let previous = group.clone();
        group.replace_records(records);

        if let Err(e) = self.persist() {
            self.groups.insert(name.to_string(), previous);
            return Err(e);
        }
        self.groups
            .get(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    /// Drop every group and erase the file. Irreversible.
    pub fn clear_all(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        self.groups.clear();
        info!("Cleared all groups");
        Ok(())
    }
}
