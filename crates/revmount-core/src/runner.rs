//! Runs one test case end to end.

use crate::builder::{BackupDriver, ExecutableBackup, RepositoryBuilder};
use crate::clock::{RevisionClock, WallClock};
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::expand::TestCase;
use crate::mount::{ExecutableMount, MountBackend, MountController};
use crate::testing::{ManualClock, SnapshotArchiver, SnapshotMount};
use crate::tool::ToolCommand;
use crate::verify::{verify, VerifyReport};
use crate::workspace::Workspace;

/// Builds archives, mounts them, and checks the view.
///
/// The collaborators are trait objects so the same harness drives the real
/// tools or the in-process doubles from [`testing`](crate::testing).
pub struct Harness {
    config: HarnessConfig,
    backup: Box<dyn BackupDriver>,
    mount: Box<dyn MountBackend>,
    clock: Box<dyn RevisionClock>,
}

impl Harness {
    /// Assembles a harness from explicit collaborators.
    pub fn new(
        config: HarnessConfig,
        backup: Box<dyn BackupDriver>,
        mount: Box<dyn MountBackend>,
        clock: Box<dyn RevisionClock>,
    ) -> Self {
        Self {
            config,
            backup,
            mount,
            clock,
        }
    }

    /// Wires the external programs named in `config`.
    pub fn from_config(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let backup = ExecutableBackup::new(config.backup_command()?);
        let mount = ExecutableMount::new(
            ToolCommand::new(config.tools.mount.clone()),
            ToolCommand::new(config.tools.unmount.clone()),
        )
        .require_mount_point(config.workspace.require_mount_point)
        .ready_timeout(config.timing.mount_ready_timeout);
        let clock = WallClock::new(config.timing.revision_resolution);

        Ok(Self::new(
            config,
            Box::new(backup),
            Box::new(mount),
            Box::new(clock),
        ))
    }

    /// In-process doubles: no external programs, no waiting.
    pub fn simulated() -> Self {
        let mut config = HarnessConfig::default();
        config.workspace.require_mount_point = false;
        Self::new(
            config,
            Box::new(SnapshotArchiver),
            Box::new(SnapshotMount::new()),
            Box::new(ManualClock::default()),
        )
    }

    /// The configuration this harness was built from.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Executes `case`: build, mount, verify, tear down.
    ///
    /// Teardown always runs. Its failures are logged, never returned, so the
    /// result is the verification outcome or the first setup error.
    pub fn run(&self, case: &TestCase) -> Result<VerifyReport> {
        let span = tracing::info_span!("case", name = %case.name, mode = %case.mode);
        let _enter = span.enter();

        case.fixture.validate()?;
        let workspace = Workspace::create(self.config.workspace.base_dir.as_deref())?;
        let result = self.run_in(case, &workspace);
        workspace.close();

        match &result {
            Ok(report) => tracing::info!(%report, "case passed"),
            Err(e) => tracing::info!("case failed: {e}"),
        }
        result
    }

    fn run_in(&self, case: &TestCase, workspace: &Workspace) -> Result<VerifyReport> {
        let archives = RepositoryBuilder::new(self.backup.as_ref(), self.clock.as_ref())
            .build(&case.fixture, workspace)?;

        let guard = MountController::new(self.mount.as_ref()).mount(
            workspace.mount_root(),
            &archives,
            case.mode,
        )?;
        let result = verify(case.policy, guard.target(), &case.fixture);

        if let Err(e) = guard.unmount() {
            tracing::warn!(target = %workspace.mount_root().display(), "unmount failed: {e}");
        }
        result
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
