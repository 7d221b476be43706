use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Context, Result};
use crate::history::HistoryEntry;

/// The whole history lives in a single blob under a fixed name.
const BLOB_FILE: &str = "history.json";

/// JSON-on-disk home for the rolling history. Read once on cold start,
/// rewritten after every successful append.
pub struct HistoryBlob {
    path: PathBuf,
}

impl HistoryBlob {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(BLOB_FILE),
        }
    }

    pub fn load(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file {}", self.path.display()))?;
        let entries = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse history file {}", self.path.display()))?;
        Ok(entries)
    }

    pub fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string(entries).context("Failed to serialize history")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write history file {}", self.path.display()))?;
        Ok(())
    }
}
