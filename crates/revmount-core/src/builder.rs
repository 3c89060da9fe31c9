//! Turns fixtures into real archives.
//!
//! For every repository the builder replays the fixture's revisions one at a
//! time: write the snapshot into the source tree, hand it to the backup
//! driver, empty the source tree, wait for the next revision boundary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::clock::RevisionClock;
use crate::error::{HarnessError, Result};
use crate::fixture::{Fixture, Revision};
use crate::tool::ToolCommand;
use crate::workspace::{clear_directory, Workspace};

/// Default backup program.
pub const DEFAULT_BACKUP_PROGRAM: &str = "rdiff-backup";

/// Creates or extends an incremental archive from a source directory.
pub trait BackupDriver: Send + Sync {
    /// Adds one increment to `archive` holding exactly the current state of
    /// `source`. Blocks until the increment is complete.
    fn snapshot(&self, source: &Path, archive: &Path) -> Result<()>;
}

/// Backup driver backed by an external program called as
/// `<program> [args...] <source> <archive>`.
#[derive(Debug, Clone)]
pub struct ExecutableBackup {
    command: ToolCommand,
}

impl ExecutableBackup {
    /// Wraps a program invocation.
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl Default for ExecutableBackup {
    fn default() -> Self {
        Self::new(ToolCommand::new(DEFAULT_BACKUP_PROGRAM))
    }
}

impl BackupDriver for ExecutableBackup {
    fn snapshot(&self, source: &Path, archive: &Path) -> Result<()> {
        self.command.run([source, archive]).map(drop)
    }
}

/// Replays fixture histories through a backup driver.
pub struct RepositoryBuilder<'a> {
    driver: &'a dyn BackupDriver,
    clock: &'a dyn RevisionClock,
}

impl<'a> RepositoryBuilder<'a> {
    /// Creates a builder.
    pub fn new(driver: &'a dyn BackupDriver, clock: &'a dyn RevisionClock) -> Self {
        Self { driver, clock }
    }

    /// Produces one archive per repository, returned in repository order.
    ///
    /// The first driver failure aborts the build.
    pub fn build(&self, fixture: &Fixture, workspace: &Workspace) -> Result<Vec<PathBuf>> {
        let source = workspace.source_root();
        let mut archives = Vec::with_capacity(fixture.len());
        let mut last_snapshot: Option<SystemTime> = None;

        for (name, revisions) in fixture.repositories() {
            let archive = workspace.archive_path(name);
            for (index, revision) in revisions.iter().enumerate() {
                if let Some(previous) = last_snapshot {
                    self.clock.await_boundary(previous);
                }

                materialize(revision, source)?;
                tracing::debug!(
                    repository = name,
                    revision = index,
                    files = revision.files.len(),
                    "taking snapshot"
                );
                self.driver.snapshot(source, &archive)?;
                // Taken after the driver returns so it is never earlier than
                // the driver's own increment timestamp.
                last_snapshot = Some(SystemTime::now());

                clear_directory(source)?;
            }
            archives.push(archive);
        }

        Ok(archives)
    }
}

/// Writes a revision's files under `root`, creating parent directories.
pub fn materialize(revision: &Revision, root: &Path) -> Result<()> {
    for (path, content) in &revision.files {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HarnessError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&target, content)
            .map_err(|e| HarnessError::io(format!("writing {}", target.display()), e))?;
    }
    Ok(())
}
