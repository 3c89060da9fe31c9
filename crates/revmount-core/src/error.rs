//! Error types for the harness.
//!
//! Every failure the harness can hit ends up as a [`HarnessError`]. Failures
//! of the mounted view itself are kept in a separate [`VerifyFailure`] so
//! callers can tell "the filesystem is wrong" apart from "the harness could
//! not run".

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while building, mounting or verifying a fixture.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The fixture cannot be materialized.
    #[error("invalid fixture: {reason}")]
    InvalidFixture {
        /// What is wrong with it.
        reason: String,
    },

    /// An external tool ran but reported failure.
    #[error("{tool} failed with {status}: {stderr}")]
    Tool {
        /// Program name as invoked.
        tool: String,
        /// Exit status of the process.
        status: ExitStatus,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        /// Program name as invoked.
        tool: String,
        /// Underlying launch error.
        #[source]
        source: io::Error,
    },

    /// The mount executable exited but no filesystem appeared at the target.
    #[error("mount at {} did not become ready within {timeout:?}", .target.display())]
    MountNotReady {
        /// Mount target that was polled.
        target: PathBuf,
        /// How long the harness waited.
        timeout: Duration,
    },

    /// The mounted view does not match the fixture.
    #[error("verification failed: {0}")]
    Verification(#[from] VerifyFailure),

    /// Filesystem error while preparing or inspecting directories.
    #[error("{context}: {source}")]
    Io {
        /// What the harness was doing.
        context: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HarnessError {
    /// Wraps an IO error with a description of the operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn invalid_fixture(reason: impl Into<String>) -> Self {
        Self::InvalidFixture {
            reason: reason.into(),
        }
    }

    /// Returns true if the mounted view, not the harness, is at fault.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }

    /// Returns true if an external collaborator failed.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::Tool { .. } | Self::Spawn { .. } | Self::MountNotReady { .. }
        )
    }
}

/// A single expectation about the mounted view that did not hold.
///
/// Verification stops at the first failure, so there is exactly one of these
/// per failed case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    /// The fixture has no repositories.
    #[error("fixture has no repositories")]
    EmptyFixture,

    /// The view lists a different number of revisions than the fixture has.
    #[error("repository '{repository}': expected {expected} revisions, found {found:?}")]
    RevisionCountMismatch {
        /// Repository name.
        repository: String,
        /// Revisions in the fixture.
        expected: usize,
        /// Revision directory names found in the view.
        found: Vec<String>,
    },

    /// The repository or revision directory could not be listed.
    #[error("repository '{repository}': cannot list {}: {error}", .path.display())]
    Unlistable {
        /// Repository name.
        repository: String,
        /// Directory that failed to list.
        path: PathBuf,
        /// IO error text.
        error: String,
    },

    /// A file expected in a revision could not be read.
    #[error("repository '{repository}', revision {revision}: cannot read '{path}': {error}")]
    Unreadable {
        /// Repository name.
        repository: String,
        /// Revision directory name.
        revision: String,
        /// Relative path inside the revision.
        path: String,
        /// IO error text.
        error: String,
    },

    /// A file's content differs from the fixture.
    #[error(
        "repository '{repository}', revision {revision}: '{path}' expected {expected:?}, got {actual:?}"
    )]
    ContentMismatch {
        /// Repository name.
        repository: String,
        /// Revision directory name.
        revision: String,
        /// Relative path inside the revision.
        path: String,
        /// Content from the fixture.
        expected: String,
        /// Content read from the view (lossy UTF-8).
        actual: String,
    },

    /// A path removed in this revision is still visible.
    #[error("repository '{repository}', revision {revision}: deleted path '{path}' still resolves")]
    DeletedPathVisible {
        /// Repository name.
        repository: String,
        /// Revision directory name.
        revision: String,
        /// Relative path inside the revision.
        path: String,
    },

    /// A path explicitly forbidden for this revision resolves.
    #[error("repository '{repository}', revision {revision}: forbidden path '{path}' resolves")]
    ForbiddenPathVisible {
        /// Repository name.
        repository: String,
        /// Revision directory name.
        revision: String,
        /// Relative path inside the revision.
        path: String,
    },

    /// A path expected in the latest-only view is absent.
    #[error("repository '{repository}': latest view is missing '{path}'")]
    MissingPath {
        /// Repository name.
        repository: String,
        /// Relative path.
        path: String,
    },

    /// A path in the latest-only view is not a directory marker.
    #[error("repository '{repository}': latest view shows '{path}' as a file, expected a directory")]
    NotADirectory {
        /// Repository name.
        repository: String,
        /// Relative path.
        path: String,
    },
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
