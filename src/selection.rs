//! Persisted "current session" selection
//!
//! A single session id kept in a small text file next to the database, so
//! the last selected chat reopens on the next start.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Durable slot holding the selected session id.
#[derive(Debug, Clone)]
pub struct SelectionSlot {
    path: PathBuf,
}

impl SelectionSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session id, if any. Blank content counts as no selection.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let id = contents.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    pub fn store(&self, session_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("tmp");

        // Write to temp file first, then rename over the slot
        fs::write(&temp, session_id)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_slot() -> (SelectionSlot, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let slot = SelectionSlot::new(temp_dir.path().join("state").join("session_id"));
        (slot, temp_dir)
    }

    #[test]
    fn load_missing_slot() {
        let (slot, _temp) = create_test_slot();
        assert_eq!(slot.load().unwrap(), None);
    }

    #[test]
    fn store_and_load() {
        let (slot, _temp) = create_test_slot();
        slot.store("abc-123").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("abc-123"));

        slot.store("def-456").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("def-456"));
        assert!(!slot.path().with_extension("tmp").exists());
    }

    #[test]
    fn clear_removes_selection() {
        let (slot, _temp) = create_test_slot();
        slot.store("abc-123").unwrap();
        slot.clear().unwrap();
        assert_eq!(slot.load().unwrap(), None);

        // Clearing an empty slot is fine
        slot.clear().unwrap();
    }

    #[test]
    fn blank_file_is_no_selection() {
        let (slot, _temp) = create_test_slot();
        slot.store("").unwrap();
        assert_eq!(slot.load().unwrap(), None);

        fs::write(slot.path(), "  abc-123\n").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("abc-123"));
    }
}
