//! Ephemeral clone directories
//!
//! A `Workspace` owns one uniquely named directory for the duration of a
//! single analytics call. `release` removes it and is safe to call any number
//! of times; dropping an unreleased workspace releases it as well, which
//! covers panics and cancelled futures.

use crate::error::FetchError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const WORKSPACE_PREFIX: &str = "repo-analytics-";

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create a fresh directory under `root`.
    pub fn create(root: &Path) -> Result<Self, FetchError> {
        let path = root.join(format!("{}{}", WORKSPACE_PREFIX, Uuid::new_v4()));
        fs::create_dir_all(&path).map_err(|source| FetchError::Workspace {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, released: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively delete the workspace directory.
    pub fn release(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.released = true;
        info!("🧹 Released workspace {:?}", self.path);
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            error!("❌ Failed to cleanup workspace {:?}: {:?}", self.path, e);
        }
    }
}

/// Remove workspaces left under `root` by calls that never reached cleanup,
/// e.g. after a crash. Returns the number of directories removed.
pub async fn sweep_stale_workspaces(root: &Path) -> usize {
    let mut cleanup_count = 0;

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to scan workspace root {:?}: {}", root, e);
            return 0;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if !file_name.starts_with(WORKSPACE_PREFIX) {
            continue;
        }
        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => cleanup_count += 1,
            Err(e) => warn!("Failed to remove stale workspace {}: {}", file_name, e),
        }
    }

    if cleanup_count > 0 {
        info!("✅ Cleaned up {} stale workspaces", cleanup_count);
    }
    cleanup_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_makes_unique_prefixed_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path()).unwrap();
        let b = Workspace::create(root.path()).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(WORKSPACE_PREFIX));
    }

    #[test]
    fn test_release_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(root.path()).unwrap();
        fs::write(ws.path().join("file.txt"), "data").unwrap();
        let path = ws.path().to_path_buf();

        ws.release().unwrap();
        assert!(!path.exists());
        assert!(ws.released);
        ws.release().unwrap();
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::create(root.path()).unwrap();
            fs::create_dir_all(ws.path().join("nested/dir")).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_release_tolerates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(root.path()).unwrap();
        fs::remove_dir_all(ws.path()).unwrap();
        assert!(ws.release().is_ok());
    }

    #[tokio::test]
    async fn test_sweep_only_touches_prefixed_entries() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join(format!("{}stale", WORKSPACE_PREFIX))).unwrap();
        fs::create_dir_all(root.path().join("unrelated")).unwrap();

        let removed = sweep_stale_workspaces(root.path()).await;

        assert_eq!(removed, 1);
        assert!(root.path().join("unrelated").exists());
    }
}
