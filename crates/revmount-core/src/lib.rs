//! Differential test harness for mounted revision views of incremental
//! backup archives.
//!
//! A test case writes a scripted sequence of directory snapshots (a
//! [`Fixture`]), records each one with an incremental backup tool, mounts the
//! resulting archives through a revision-browsing filesystem and checks that
//! the mounted view reproduces every revision exactly.
//!
//! # Components
//!
//! - [`Fixture`] / [`Revision`] - declarative per-repository histories
//! - [`RepositoryBuilder`] - replays a fixture through a [`BackupDriver`]
//! - [`MountController`] - mounts archives through a [`MountBackend`] and
//!   hands back a [`MountGuard`]
//! - [`verify`] - checks a mounted view against its fixture
//! - [`expand`] / [`revision_suite!`] - turn a fixture table into cases
//! - [`Harness`] - runs one [`TestCase`] end to end
//! - [`catalog`] - the standard fixture table
//! - [`testing`] - in-process doubles for the external programs
//!
//! # Example
//!
//! ```
//! use revmount_core::{catalog, expand_all, Harness};
//!
//! let harness = Harness::simulated();
//! for case in expand_all(&catalog::all()).iter().take(3) {
//!     harness.run(case).unwrap();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
pub mod catalog;
mod clock;
pub mod config;
mod error;
mod expand;
mod fixture;
mod mount;
mod runner;
mod tool;
mod verify;
mod workspace;

/// Test doubles for running the harness without the external programs.
pub mod testing;

pub use builder::{materialize, BackupDriver, ExecutableBackup, RepositoryBuilder, DEFAULT_BACKUP_PROGRAM};
pub use clock::{RevisionClock, WallClock, DEFAULT_REVISION_RESOLUTION};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result, VerifyFailure};
pub use expand::{expand, expand_all, TestCase};
pub use fixture::{reverse_revisions, Fixture, NamedFixture, Revision};
pub use mount::{
    is_mount_point, wait_for_mount, ExecutableMount, MountBackend, MountController, MountGuard,
    MountMode, DEFAULT_MOUNT_EXECUTABLE, DEFAULT_MOUNT_READY_TIMEOUT, DEFAULT_UNMOUNT_EXECUTABLE,
};
pub use runner::Harness;
pub use tool::ToolCommand;
pub use verify::{repository_root, revision_directories, verify, VerifyPolicy, VerifyReport};
pub use workspace::{clear_directory, Workspace};
