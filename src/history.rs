use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Key the job list is stored under.
const HISTORY_KEY: &str = "job_history";
/// Oldest entries beyond this are dropped.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// String key-value store backing persisted state.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

/// Storage kept in a JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                error!(path = ?path, error = %e, "storage file is not a JSON object of strings");
                eyre!("Invalid storage file {:?}: {}", path, e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(eyre!("Failed to read storage file {:?}: {}", path, e)),
        };
        debug!(path = ?path, key_count = values.len(), "opened file storage");
        Ok(Self { path, values })
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json).map_err(|e| {
            error!(path = ?self.path, error = %e, "failed to write storage file");
            eyre!("Failed to write storage file {:?}: {}", self.path, e)
        })
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.flush()
    }
}

/// One submitted or fetched job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Last known status, as text.
    pub status: String,
    /// Seconds since the Unix epoch.
    pub recorded_at: u64,
}

impl JobEntry {
    /// Entry stamped with the current time.
    #[must_use]
    pub fn now(id: impl Into<String>, status: impl Into<String>) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            id: id.into(),
            label: None,
            status: status.into(),
            recorded_at,
        }
    }
}

/// Recently seen jobs, newest first.
#[derive(Debug)]
pub struct JobHistory<S: Storage> {
    storage: S,
}

impl<S: Storage> JobHistory<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// All entries, newest first. A corrupt stored list reads as empty.
    #[must_use]
    pub fn list(&self) -> Vec<JobEntry> {
        let Some(text) = self.storage.get(HISTORY_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(error = %e, "discarding unreadable job history");
            Vec::new()
        })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<JobEntry> {
        self.list().into_iter().find(|entry| entry.id == id)
    }

    /// Adds `entry` at the front, replacing any entry with the same id.
    pub fn record(&mut self, entry: JobEntry) -> Result<()> {
        let mut entries = self.list();
        entries.retain(|existing| existing.id != entry.id);
        entries.insert(0, entry);
        entries.truncate(MAX_HISTORY_ENTRIES);
        self.save(&entries)
    }

    /// Removes the entry for `id`, returning whether one existed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let mut entries = self.list();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.storage.remove(HISTORY_KEY)
    }

    fn save(&mut self, entries: &[JobEntry]) -> Result<()> {
        let text = serde_json::to_string(entries)?;
        self.storage.set(HISTORY_KEY, text)?;
        debug!(entry_count = entries.len(), "saved job history");
        Ok(())
    }
}
