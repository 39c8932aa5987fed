//! Pin Store.
//!
//! An ordered, duplicate-free list of application ids persisted as one id
//! per line.  Every mutation rewrites the whole file before returning; a
//! failed write rolls the in-memory list back so memory and disk agree.

use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Error from reading or writing the pin file.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("write {0}: {1}")]
    Write(PathBuf, std::io::Error),
}

/// The persisted pinned set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinStore {
    path: PathBuf,
    ids: Vec<String>,
}

impl PinStore {
    /// Load the pinned set from `path`.  A missing file is an empty set.
    ///
    /// Blank lines are skipped, ids are trimmed, and repeated ids keep
    /// their first position only.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PinError> {
        let path = path.into();
        let ids = match std::fs::read_to_string(&path) {
            Ok(text) => parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no pin file at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(PinError::Read(path, e)),
        };
        Ok(Self { path, ids })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_pinned(&self, app_id: &str) -> bool {
        let wanted = app_id.trim();
        self.ids.iter().any(|p| p == wanted)
    }

    /// Append `app_id` and save.  Returns `Ok(false)` without touching the
    /// file when it is blank or already pinned.
    pub fn pin(&mut self, app_id: &str) -> Result<bool, PinError> {
        let id = app_id.trim();
        if id.is_empty() || self.is_pinned(id) {
            return Ok(false);
        }
        self.ids.push(id.to_string());
        if let Err(e) = self.save() {
            self.ids.pop();
            return Err(e);
        }
        info!("pinned {}", id);
        Ok(true)
    }

    /// Remove the first occurrence of `app_id` and save.  Returns
    /// `Ok(false)` when it was not pinned.
    pub fn unpin(&mut self, app_id: &str) -> Result<bool, PinError> {
        let id = app_id.trim();
        let Some(pos) = self.ids.iter().position(|p| p == id) else {
            return Ok(false);
        };
        let removed = self.ids.remove(pos);
        if let Err(e) = self.save() {
            self.ids.insert(pos, removed);
            return Err(e);
        }
        info!("unpinned {}", id);
        Ok(true)
    }

    /// Rewrite the whole file, one id per line.
    pub fn save(&self) -> Result<(), PinError> {
        let err = |e| PinError::Write(self.path.clone(), e);
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(err)?;
        }
        let mut file = std::fs::File::create(&self.path).map_err(err)?;
        for id in &self.ids {
            writeln!(file, "{}", id).map_err(err)?;
        }
        file.sync_all().map_err(err)
    }
}

fn parse(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|p| p == line) {
            ids.push(line.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> PinStore {
        PinStore::load(dir.path().join("swaydock-pinned")).unwrap()
    }

    #[test]
    fn missing_file_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.ids().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn load_skips_blanks_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pins");
        std::fs::write(&path, "foot\n\n  firefox \nfoot\n\t\n").unwrap();
        let store = PinStore::load(&path).unwrap();
        assert_eq!(store.ids(), ["foot", "firefox"]);
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        for id in ["thunar", "foot", "firefox"] {
            assert!(store.pin(id).unwrap());
        }
        let reloaded = PinStore::load(store.path()).unwrap();
        assert_eq!(reloaded, store);
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "thunar\nfoot\nfirefox\n"
        );
    }

    #[test]
    fn pin_is_noop_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.pin("foot").unwrap();
        assert!(!store.pin("foot").unwrap());
        assert!(!store.pin("  ").unwrap());
        assert_eq!(store.ids(), ["foot"]);
    }

    #[test]
    fn unpin_reverts_pin() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.pin("foot").unwrap();
        store.pin("firefox").unwrap();
        let before = store.ids().to_vec();

        store.pin("thunar").unwrap();
        store.unpin("thunar").unwrap();
        assert_eq!(store.ids(), before.as_slice());
        assert_eq!(PinStore::load(store.path()).unwrap().ids(), before.as_slice());
    }

    #[test]
    fn unpin_absent_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        assert!(!store.unpin("nothing").unwrap());
    }

    #[test]
    fn failed_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // The pin file path is an existing directory, so writing fails.
        let path = dir.path().join("pins");
        std::fs::create_dir(&path).unwrap();
        let mut store = PinStore {
            path,
            ids: vec!["foot".into()],
        };
        assert!(matches!(store.pin("firefox"), Err(PinError::Write(..))));
        assert_eq!(store.ids(), ["foot"]);
        assert!(store.unpin("foot").is_err());
        assert_eq!(store.ids(), ["foot"]);
    }
}
