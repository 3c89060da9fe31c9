//! In-process stand-ins for the backup driver and the mount executable.
//!
//! [`SnapshotArchiver`] stores every increment as a plain copy of the source
//! tree under `<archive>/<NNNNNN>/`. [`SnapshotMount`] publishes those copies
//! at the mount target with the same layout the real view uses, optionally
//! with a [`Defect`] injected so the verifier has something to catch.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::builder::BackupDriver;
use crate::error::{HarnessError, Result};
use crate::mount::{MountBackend, MountMode};
use crate::workspace::clear_directory;

/// Snapshot contents: relative path to file bytes.
type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

/// Backup driver that copies the source tree into numbered snapshot
/// directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotArchiver;

impl BackupDriver for SnapshotArchiver {
    fn snapshot(&self, source: &Path, archive: &Path) -> Result<()> {
        fs::create_dir_all(archive)
            .map_err(|e| HarnessError::io(format!("creating {}", archive.display()), e))?;
        let sequence = snapshot_names(archive)?.len();
        let destination = archive.join(format!("{sequence:06}"));
        write_snapshot(&destination, &read_snapshot(source)?)
    }
}

/// A deliberate bug in the simulated view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Defect {
    /// Files first added in revision N+1 also show up in revision N.
    LeakFuture,
    /// Files deleted in revision N+1 are still present there.
    RetainDeleted,
    /// Every revision serves the first revision's content for shared paths.
    StaleContent,
    /// The latest-only view publishes regular files instead of directories.
    LatestAsFiles,
}

/// Mount backend that materializes snapshot archives at the target.
#[derive(Debug, Clone, Default)]
pub struct SnapshotMount {
    defect: Option<Defect>,
}

impl SnapshotMount {
    /// A faithful view.
    pub fn new() -> Self {
        Self::default()
    }

    /// A view with one injected defect.
    #[must_use]
    pub fn with_defect(defect: Defect) -> Self {
        Self {
            defect: Some(defect),
        }
    }

    fn publish_history(&self, archive: &Path, dest: &Path) -> Result<()> {
        let names = snapshot_names(archive)?;
        let snapshots = names
            .iter()
            .map(|name| read_snapshot(&archive.join(name)))
            .collect::<Result<Vec<_>>>()?;

        for (index, name) in names.iter().enumerate() {
            let mut view = snapshots[index].clone();
            match self.defect {
                Some(Defect::LeakFuture) => {
                    if let Some(next) = snapshots.get(index + 1) {
                        for (path, content) in next {
                            view.entry(path.clone()).or_insert_with(|| content.clone());
                        }
                    }
                }
                Some(Defect::RetainDeleted) => {
                    if let Some(previous) = index.checked_sub(1).map(|i| &snapshots[i]) {
                        for (path, content) in previous {
                            view.entry(path.clone()).or_insert_with(|| content.clone());
                        }
                    }
                }
                Some(Defect::StaleContent) => {
                    for (path, content) in &mut view {
                        if let Some(first) = snapshots[0].get(path) {
                            content.clone_from(first);
                        }
                    }
                }
                Some(Defect::LatestAsFiles) | None => {}
            }
            write_snapshot(&dest.join(name), &view)?;
        }
        Ok(())
    }

    fn publish_latest(&self, archive: &Path, dest: &Path) -> Result<()> {
        let Some(last) = snapshot_names(archive)?.pop() else {
            return Ok(());
        };
        for path in read_snapshot(&archive.join(last))?.keys() {
            let target = dest.join(path);
            if self.defect == Some(Defect::LatestAsFiles) {
                if let Some(parent) = target.parent() {
                    create_dir(parent)?;
                }
                fs::write(&target, b"")
                    .map_err(|e| HarnessError::io(format!("writing {}", target.display()), e))?;
            } else {
                create_dir(&target)?;
            }
        }
        Ok(())
    }
}

impl MountBackend for SnapshotMount {
    fn mount(&self, target: &Path, archives: &[PathBuf], mode: MountMode) -> Result<()> {
        for archive in archives {
            let dest = if archives.len() == 1 {
                target.to_path_buf()
            } else {
                let name = archive.file_name().ok_or_else(|| {
                    HarnessError::Config(format!("archive path {} has no name", archive.display()))
                })?;
                target.join(name)
            };
            create_dir(&dest)?;

            match mode {
                MountMode::Full | MountMode::Necessary => self.publish_history(archive, &dest)?,
                MountMode::Latest => self.publish_latest(archive, &dest)?,
            }
        }
        tracing::trace!(target = %target.display(), %mode, defect = ?self.defect, "published snapshot view");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        clear_directory(target)
    }
}

/// Sorted snapshot directory names of an archive.
fn snapshot_names(archive: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(archive)
        .map_err(|e| HarnessError::io(format!("listing {}", archive.display()), e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HarnessError::io(format!("listing {}", archive.display()), e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn read_snapshot(root: &Path) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let context = format!("walking {}", root.display());
            HarnessError::io(context, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| HarnessError::Config(format!("unexpected path in snapshot: {e}")))?
            .to_path_buf();
        let content = fs::read(entry.path())
            .map_err(|e| HarnessError::io(format!("reading {}", entry.path().display()), e))?;
        snapshot.insert(relative, content);
    }
    Ok(snapshot)
}

fn write_snapshot(root: &Path, snapshot: &Snapshot) -> Result<()> {
    create_dir(root)?;
    for (path, content) in snapshot {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }
        fs::write(&target, content)
            .map_err(|e| HarnessError::io(format!("writing {}", target.display()), e))?;
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| HarnessError::io(format!("creating {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive_with(temp: &TempDir, name: &str, revisions: &[&[(&str, &str)]]) -> PathBuf {
        let archive = temp.path().join("archives").join(name);
        let source = temp.path().join("source");
        for files in revisions {
            fs::create_dir_all(&source).unwrap();
            for (path, content) in *files {
                let target = source.join(path);
                fs::create_dir_all(target.parent().unwrap()).unwrap();
                fs::write(target, content).unwrap();
            }
            SnapshotArchiver.snapshot(&source, &archive).unwrap();
            fs::remove_dir_all(&source).unwrap();
        }
        archive
    }

    #[test]
    fn test_archiver_numbers_snapshots() {
        let temp = TempDir::new().unwrap();
        let archive = archive_with(&temp, "repo", &[&[("a", "1")], &[("a", "2"), ("d/b", "x")]]);

        assert_eq!(snapshot_names(&archive).unwrap(), vec!["000000", "000001"]);
        assert_eq!(fs::read_to_string(archive.join("000001/d/b")).unwrap(), "x");
        assert!(!archive.join("000000/d").exists());
    }

    #[test]
    fn test_single_archive_mounts_at_target() {
        let temp = TempDir::new().unwrap();
        let archive = archive_with(&temp, "repo", &[&[("a", "1")]]);
        let target = temp.path().join("mnt");

        SnapshotMount::new()
            .mount(&target, &[archive], MountMode::Full)
            .unwrap();

        assert_eq!(fs::read_to_string(target.join("000000/a")).unwrap(), "1");
    }

    #[test]
    fn test_multiple_archives_get_subdirectories() {
        let temp = TempDir::new().unwrap();
        let first = archive_with(&temp, "first", &[&[("a", "1")]]);
        let second = archive_with(&temp, "second", &[&[("b", "2")]]);
        let target = temp.path().join("mnt");

        SnapshotMount::new()
            .mount(&target, &[first, second], MountMode::Necessary)
            .unwrap();

        assert!(target.join("first/000000/a").is_file());
        assert!(target.join("second/000000/b").is_file());
    }

    #[test]
    fn test_latest_publishes_directories() {
        let temp = TempDir::new().unwrap();
        let archive = archive_with(&temp, "repo", &[&[("old", "1")], &[("dir/file", "2")]]);
        let target = temp.path().join("mnt");

        SnapshotMount::new()
            .mount(&target, &[archive], MountMode::Latest)
            .unwrap();

        assert!(target.join("dir/file").is_dir());
        assert!(!target.join("old").exists());
    }

    #[test]
    fn test_defects_alter_the_view() {
        let temp = TempDir::new().unwrap();
        let archive = archive_with(&temp, "repo", &[&[("a", "1"), ("gone", "x")], &[("a", "2"), ("new", "y")]]);

        let leak = temp.path().join("leak");
        SnapshotMount::with_defect(Defect::LeakFuture)
            .mount(&leak, std::slice::from_ref(&archive), MountMode::Full)
            .unwrap();
        assert!(leak.join("000000/new").exists());

        let retain = temp.path().join("retain");
        SnapshotMount::with_defect(Defect::RetainDeleted)
            .mount(&retain, std::slice::from_ref(&archive), MountMode::Full)
            .unwrap();
        assert!(retain.join("000001/gone").exists());

        let stale = temp.path().join("stale");
        SnapshotMount::with_defect(Defect::StaleContent)
            .mount(&stale, std::slice::from_ref(&archive), MountMode::Full)
            .unwrap();
        assert_eq!(fs::read_to_string(stale.join("000001/a")).unwrap(), "1");

        let files = temp.path().join("files");
        SnapshotMount::with_defect(Defect::LatestAsFiles)
            .mount(&files, std::slice::from_ref(&archive), MountMode::Latest)
            .unwrap();
        assert!(files.join("new").is_file());
    }

    #[test]
    fn test_unmount_empties_target() {
        let temp = TempDir::new().unwrap();
        let archive = archive_with(&temp, "repo", &[&[("a", "1")]]);
        let target = temp.path().join("mnt");
        let backend = SnapshotMount::new();

        backend.mount(&target, &[archive], MountMode::Full).unwrap();
        backend.unmount(&target).unwrap();

        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }
}
