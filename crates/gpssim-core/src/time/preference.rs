//! Persisted network mode preference
//!
//! The only state the simulator writes back to disk: one plain-text token
//! naming the last successfully selected network mode.

use super::source::NetworkMode;
use std::path::{Path, PathBuf};

/// File-backed mode preference
///
/// A store without a path keeps the preference in memory only.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the stored mode, defaulting to client mode when missing or unreadable
    pub fn load(&self) -> NetworkMode {
        let Some(path) = &self.path else {
            return NetworkMode::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => match NetworkMode::from_token(contents.trim()) {
                Some(mode) => {
                    tracing::info!(path = %path.display(), %mode, "Loaded mode preference");
                    mode
                }
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        token = contents.trim(),
                        "Unrecognised mode preference, using client mode"
                    );
                    NetworkMode::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No mode preference found, using client mode");
                NetworkMode::default()
            }
        }
    }

    /// Persist `mode`, creating parent directories if needed
    pub fn save(&self, mode: NetworkMode) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, mode.as_token())?;
        tracing::debug!(path = %path.display(), %mode, "Mode preference saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_defaults_to_client() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("mode"));
        assert_eq!(store.load(), NetworkMode::Client);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mode");
        let store = PreferenceStore::new(&path);

        store.save(NetworkMode::AccessPoint).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "access_point");
        assert_eq!(store.load(), NetworkMode::AccessPoint);

        store.save(NetworkMode::Client).unwrap();
        assert_eq!(store.load(), NetworkMode::Client);
    }

    #[test]
    fn test_garbage_token_defaults_to_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode");
        std::fs::write(&path, "bluetooth\n").unwrap();
        assert_eq!(PreferenceStore::new(&path).load(), NetworkMode::Client);
    }

    #[test]
    fn test_trailing_whitespace_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode");
        std::fs::write(&path, "access_point\r\n").unwrap();
        assert_eq!(PreferenceStore::new(&path).load(), NetworkMode::AccessPoint);
    }

    #[test]
    fn test_in_memory_store() {
        let store = PreferenceStore::in_memory();
        store.save(NetworkMode::AccessPoint).unwrap();
        assert_eq!(store.load(), NetworkMode::Client);
        assert!(store.path().is_none());
    }
}
