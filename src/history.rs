use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::config::project_dirs;
use crate::error::Result;

/// Launch counts keyed by the executed command line.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct History {
    pub usage_counts: HashMap<String, u32>,
}

impl History {
    pub fn count(&self, key: &str) -> u32 {
        self.usage_counts.get(key).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, key: &str) {
        *self.usage_counts.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Reads the store at `path`; a missing or unreadable file is an empty history.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Discarding corrupt history {:?}: {}", path, e);
                History::default()
            }),
            Err(_) => History::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

pub fn default_history_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("history.json"))
}

pub fn load_history() -> History {
    default_history_path()
        .map(|path| History::load_from(&path))
        .unwrap_or_default()
}

/// Bumps the count for `key` in the store at `path`.
pub fn record_usage(path: &Path, key: &str) -> Result<()> {
    let mut history = History::load_from(path);
    history.increment(key);
    history.save_to(path)
}
