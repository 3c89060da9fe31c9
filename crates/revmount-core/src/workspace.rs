//! Per-run working directories.
//!
//! Every case gets its own temporary directory holding the source tree, the
//! archives and the mount point, so concurrent cases never touch each
//! other's files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{HarnessError, Result};

const SOURCE_DIR: &str = "source";
const ARCHIVE_DIR: &str = "archives";
const MOUNT_DIR: &str = "mount";

/// Source, archive and mount roots for one case execution.
///
/// Dropping the workspace deletes everything under it. Unmount the view
/// first; deleting through a live mount would walk into the archive view.
#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
    source: PathBuf,
    archives: PathBuf,
    mount: PathBuf,
}

impl Workspace {
    /// Creates a fresh workspace, optionally under `base_dir`.
    pub fn create(base_dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("revmount-");
        let root = match base_dir {
            Some(base) => {
                fs::create_dir_all(base).map_err(|e| {
                    HarnessError::io(format!("creating base directory {}", base.display()), e)
                })?;
                builder.tempdir_in(base)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| HarnessError::io("creating workspace", e))?;

        let source = root.path().join(SOURCE_DIR);
        let archives = root.path().join(ARCHIVE_DIR);
        let mount = root.path().join(MOUNT_DIR);
        for dir in [&source, &archives, &mount] {
            fs::create_dir(dir)
                .map_err(|e| HarnessError::io(format!("creating {}", dir.display()), e))?;
        }

        tracing::debug!(root = %root.path().display(), "created workspace");
        Ok(Self {
            root,
            source,
            archives,
            mount,
        })
    }

    /// Top-level temporary directory.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Directory the builder materializes revisions into.
    pub fn source_root(&self) -> &Path {
        &self.source
    }

    /// Directory holding one archive per repository.
    pub fn archive_root(&self) -> &Path {
        &self.archives
    }

    /// Archive location for a repository.
    pub fn archive_path(&self, repository: &str) -> PathBuf {
        self.archives.join(repository)
    }

    /// Mount target for the view.
    pub fn mount_root(&self) -> &Path {
        &self.mount
    }

    /// Deletes the workspace, logging instead of failing.
    pub fn close(self) {
        let root = self.root.path().to_path_buf();
        if let Err(e) = self.root.close() {
            tracing::warn!(root = %root.display(), "failed to remove workspace: {e}");
        }
    }
}

/// Removes everything inside `dir` but keeps `dir` itself.
///
/// A missing directory counts as already empty.
pub fn clear_directory(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(HarnessError::io(format!("listing {}", dir.display()), e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| HarnessError::io(format!("listing {}", dir.display()), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| HarnessError::io(format!("inspecting {}", path.display()), e))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(HarnessError::io(format!("removing {}", path.display()), e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lays_out_three_roots() {
        let workspace = Workspace::create(None).unwrap();
        assert!(workspace.source_root().is_dir());
        assert!(workspace.archive_root().is_dir());
        assert!(workspace.mount_root().is_dir());
        assert_eq!(
            workspace.archive_path("repo"),
            workspace.archive_root().join("repo")
        );
    }

    #[test]
    fn test_workspaces_are_unique() {
        let a = Workspace::create(None).unwrap();
        let b = Workspace::create(None).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_create_under_base_dir() {
        let base = TempDir::new().unwrap();
        let nested = base.path().join("not/yet/there");
        let workspace = Workspace::create(Some(&nested)).unwrap();
        assert!(workspace.root().starts_with(&nested));
    }

    #[test]
    fn test_close_removes_everything() {
        let workspace = Workspace::create(None).unwrap();
        let root = workspace.root().to_path_buf();
        fs::write(workspace.source_root().join("file"), b"x").unwrap();
        workspace.close();
        assert!(!root.exists());
    }

    #[test]
    fn test_clear_directory_keeps_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        fs::create_dir_all(dir.join("a/b")).unwrap();
        fs::write(dir.join("a/b/file"), b"1").unwrap();
        fs::write(dir.join("top"), b"2").unwrap();

        clear_directory(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_missing_directory_is_ok() {
        let temp = TempDir::new().unwrap();
        clear_directory(&temp.path().join("never-created")).unwrap();
    }
}
