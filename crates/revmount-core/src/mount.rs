//! Mounting archives as a browsable revision tree.
//!
//! The mount executable is expected to behave like `rdiff-backup-fs`:
//! `<exe> <target> <archive>... [-f|-l]` returns once the view is mounted
//! (the filesystem daemon detaches into the background). Unmounting goes
//! through `fusermount -u`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::tool::{run_to_completion, ToolCommand};

/// Default mount executable.
pub const DEFAULT_MOUNT_EXECUTABLE: &str = "./rdiff-backup-fs";

/// Default unmount utility.
pub const DEFAULT_UNMOUNT_EXECUTABLE: &str = "fusermount";

/// How long to wait for the view to appear after the mount tool exits.
pub const DEFAULT_MOUNT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait between mount readiness checks.
const MOUNT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Which revisions the mounted view materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    /// Every historical revision as its own directory (`-f`).
    Full,
    /// Only the revisions needed to reconstruct history (no flag).
    Necessary,
    /// Only the final state, changed paths as directory markers (`-l`).
    Latest,
}

impl MountMode {
    /// All modes, in the order cases are generated.
    pub const ALL: [MountMode; 3] = [MountMode::Full, MountMode::Necessary, MountMode::Latest];

    /// Command-line flag passed to the mount executable, if any.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            MountMode::Full => Some("-f"),
            MountMode::Necessary => None,
            MountMode::Latest => Some("-l"),
        }
    }

    /// Suffix appended to generated case names.
    pub fn suffix(self) -> &'static str {
        match self {
            MountMode::Full => "full",
            MountMode::Necessary => "necessary",
            MountMode::Latest => "last",
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Something that can expose archives as a revision tree.
pub trait MountBackend: Send + Sync {
    /// Mounts `archives` at `target`; returns once the view is readable.
    fn mount(&self, target: &Path, archives: &[PathBuf], mode: MountMode) -> Result<()>;

    /// Detaches whatever is mounted at `target`.
    ///
    /// Must succeed when nothing is mounted there.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// Mount backend driving the external mount executable and unmount utility.
#[derive(Debug, Clone)]
pub struct ExecutableMount {
    mount: ToolCommand,
    unmount: ToolCommand,
    require_mount_point: bool,
    ready_timeout: Duration,
}

impl ExecutableMount {
    /// Creates a backend from the two tools.
    pub fn new(mount: ToolCommand, unmount: ToolCommand) -> Self {
        Self {
            mount,
            unmount,
            require_mount_point: true,
            ready_timeout: DEFAULT_MOUNT_READY_TIMEOUT,
        }
    }

    /// Whether to wait for a new filesystem to appear at the target after
    /// the mount executable exits.
    #[must_use]
    pub fn require_mount_point(mut self, require: bool) -> Self {
        self.require_mount_point = require;
        self
    }

    /// Sets the mount readiness timeout.
    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Arguments for one mount invocation, excluding the program.
    pub fn mount_args(target: &Path, archives: &[PathBuf], mode: MountMode) -> Vec<PathBuf> {
        let mut args = Vec::with_capacity(archives.len() + 2);
        args.push(target.to_path_buf());
        args.extend(archives.iter().cloned());
        if let Some(flag) = mode.flag() {
            args.push(PathBuf::from(flag));
        }
        args
    }

    fn detach(&self, target: &Path, flag: &str) -> Result<()> {
        let mut command = self.unmount.command();
        command.arg(flag).arg(target);
        run_to_completion(&mut command, self.unmount.program()).map(drop)
    }
}

impl Default for ExecutableMount {
    fn default() -> Self {
        Self::new(
            ToolCommand::new(DEFAULT_MOUNT_EXECUTABLE),
            ToolCommand::new(DEFAULT_UNMOUNT_EXECUTABLE),
        )
    }
}

impl MountBackend for ExecutableMount {
    fn mount(&self, target: &Path, archives: &[PathBuf], mode: MountMode) -> Result<()> {
        // The mount executable may leave a daemon holding its output open;
        // only the launched process's exit is awaited.
        self.mount
            .run_until_exit(Self::mount_args(target, archives, mode))?;
        if self.require_mount_point {
            wait_for_mount(target, self.ready_timeout)?;
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        match self.detach(target, "-u") {
            Ok(()) => {
                tracing::debug!(target = %target.display(), "unmounted");
                return Ok(());
            }
            // Usually "not mounted", which is fine.
            Err(e) => tracing::debug!(target = %target.display(), "unmount failed: {e}"),
        }

        if is_mount_point(target).unwrap_or(false) {
            if let Err(e) = self.detach(target, "-uz") {
                tracing::warn!(target = %target.display(), "lazy unmount failed: {e}");
            }
        }
        Ok(())
    }
}

/// Check if a path is a mount point (different device from parent).
#[cfg(unix)]
pub fn is_mount_point(path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let path_meta = fs::metadata(path)
        .map_err(|e| HarnessError::io(format!("stat {}", path.display()), e))?;
    let parent = path.parent().unwrap_or(Path::new("/"));
    let parent_meta = fs::metadata(parent)
        .map_err(|e| HarnessError::io(format!("stat {}", parent.display()), e))?;

    Ok(path_meta.dev() != parent_meta.dev())
}

/// Check if a path is a mount point (approximated as "is a directory").
#[cfg(not(unix))]
pub fn is_mount_point(path: &Path) -> Result<bool> {
    Ok(path.is_dir())
}

/// Polls until a filesystem is mounted at `target` or `timeout` passes.
pub fn wait_for_mount(target: &Path, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if is_mount_point(target).unwrap_or(false) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::MountNotReady {
                target: target.to_path_buf(),
                timeout,
            });
        }
        thread::sleep(MOUNT_CHECK_INTERVAL);
    }
}

/// Mounts views and hands back guards that detach them again.
pub struct MountController<'a> {
    backend: &'a dyn MountBackend,
}

impl<'a> MountController<'a> {
    /// Wraps a backend.
    pub fn new(backend: &'a dyn MountBackend) -> Self {
        Self { backend }
    }

    /// Mounts `archives` at `target` in `mode`.
    pub fn mount(
        &self,
        target: &Path,
        archives: &[PathBuf],
        mode: MountMode,
    ) -> Result<MountGuard<'a>> {
        tracing::debug!(
            target = %target.display(),
            archives = archives.len(),
            %mode,
            "mounting"
        );
        if let Err(e) = self.backend.mount(target, archives, mode) {
            // A failed mount can still leave something attached.
            if let Err(unmount_err) = self.backend.unmount(target) {
                tracing::debug!("cleanup after failed mount: {unmount_err}");
            }
            return Err(e);
        }
        Ok(MountGuard {
            backend: self.backend,
            target: target.to_path_buf(),
            mounted: true,
        })
    }
}

/// A mounted view; unmounts on drop.
pub struct MountGuard<'a> {
    backend: &'a dyn MountBackend,
    target: PathBuf,
    mounted: bool,
}

impl MountGuard<'_> {
    /// Where the view is mounted.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Unmounts now instead of on drop.
    pub fn unmount(mut self) -> Result<()> {
        self.mounted = false;
        self.backend.unmount(&self.target)
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.mounted {
            tracing::debug!(target = %self.target.display(), "unmounting on drop");
            if let Err(e) = self.backend.unmount(&self.target) {
                tracing::warn!(target = %self.target.display(), "failed to unmount: {e}");
            }
        }
    }
}
