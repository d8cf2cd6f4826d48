//! Local filesystem store.
//!
//! Files are written with the `.slider.tmp` + rename protocol so a crash
//! never leaves a half-written file under its final name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use slider_core::ItemPath;

use crate::error::{io_err, StoreError};
use crate::store::Store;

/// Store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a store-relative path.
    pub fn resolve(&self, path: &ItemPath) -> PathBuf {
        path.segments()
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    /// First free variant of `to`: `to`, `name (1).ext`, `name (2).ext`, …
    fn free_target(&self, to: &ItemPath) -> Result<ItemPath, StoreError> {
        if !self.exists(to)? {
            return Ok(to.clone());
        }
        let mut n = 1usize;
        loop {
            let candidate = to.with_stem_suffix(&format!(" ({n})"));
            if !self.exists(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

impl Store for LocalStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn exists(&self, path: &ItemPath) -> Result<bool, StoreError> {
        let abs = self.resolve(path);
        abs.try_exists().map_err(|e| io_err(abs, e))
    }

    fn create_folder(&self, path: &ItemPath) -> Result<(), StoreError> {
        let abs = self.resolve(path);
        std::fs::create_dir_all(&abs).map_err(|e| io_err(abs, e))
    }

    fn save_file(&self, path: &ItemPath, bytes: &[u8], overwrite: bool) -> Result<(), StoreError> {
        if !overwrite {
            self.displace(path)?;
        }

        let abs = self.resolve(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let tmp = PathBuf::from(format!("{}.slider.tmp", abs.display()));
        std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &abs) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(abs, e));
        }

        tracing::debug!(path = %abs.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }

    fn download_file(&self, path: &ItemPath) -> Result<Vec<u8>, StoreError> {
        let abs = self.resolve(path);
        std::fs::read(&abs).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound { path: path.clone() },
            _ => io_err(abs, e),
        })
    }

    fn move_file(&self, from: &ItemPath, to: &ItemPath) -> Result<ItemPath, StoreError> {
        let target = self.free_target(to)?;
        let src = self.resolve(from);
        let dst = self.resolve(&target);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::rename(&src, &dst).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound { path: from.clone() },
            _ => io_err(src, e),
        })?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn create_folder_is_idempotent() {
        let (tmp, store) = store();
        let folder = ItemPath::folder("Course/Slides");
        store.create_folder(&folder).unwrap();
        store.create_folder(&folder).unwrap();
        assert!(tmp.path().join("Course").join("Slides").is_dir());
        assert!(store.exists(&folder).unwrap());
    }

    #[test]
    fn save_then_download_returns_bytes() {
        let (_tmp, store) = store();
        let path = ItemPath::from("Course/a.pdf");
        store.save_file(&path, b"%PDF", false).unwrap();
        assert!(store.exists(&path).unwrap());
        assert_eq!(store.download_file(&path).unwrap(), b"%PDF");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let (tmp, store) = store();
        store.save_file(&ItemPath::from("clean.txt"), b"data", false).unwrap();
        assert!(!tmp.path().join("clean.txt.slider.tmp").exists());
    }

    #[test]
    fn save_without_overwrite_displaces_existing_file() {
        let (tmp, store) = store();
        let path = ItemPath::from("Course/a.pdf");
        store.save_file(&path, b"user copy", false).unwrap();
        store.save_file(&path, b"fresh download", false).unwrap();

        assert_eq!(store.download_file(&path).unwrap(), b"fresh download");
        let kept = tmp.path().join(".overwritten").join("Course").join("a.pdf");
        assert_eq!(fs::read(kept).unwrap(), b"user copy");
    }

    #[test]
    fn save_with_overwrite_replaces_in_place() {
        let (tmp, store) = store();
        let path = ItemPath::from(".db/files.json");
        store.save_file(&path, b"v1", true).unwrap();
        store.save_file(&path, b"v2", true).unwrap();
        assert_eq!(store.download_file(&path).unwrap(), b"v2");
        assert!(!tmp.path().join(".overwritten").exists());
    }

    #[test]
    fn move_onto_occupied_target_disambiguates() {
        let (_tmp, store) = store();
        let target = ItemPath::from(".overwritten/a.pdf");
        store.save_file(&target, b"older", true).unwrap();
        store.save_file(&ItemPath::from("a.pdf"), b"newer", true).unwrap();

        let moved = store.move_file(&ItemPath::from("a.pdf"), &target).unwrap();
        assert_eq!(moved.as_str(), ".overwritten/a (1).pdf");
        assert_eq!(store.download_file(&target).unwrap(), b"older");
        assert_eq!(store.download_file(&moved).unwrap(), b"newer");
    }

    #[test]
    fn download_missing_is_not_found() {
        let (_tmp, store) = store();
        let err = store.download_file(&ItemPath::from("nope.pdf")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
