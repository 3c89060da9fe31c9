//! Checks a mounted view against the fixture it was built from.
//!
//! Two policies exist. The history policy (full and necessary mounts)
//! replays the fixture revision by revision: exact content, deleted paths
//! gone, forbidden paths never visible. The latest-only policy checks that
//! every path of the final revision shows up as a directory marker.
//!
//! Verification stops at the first expectation that does not hold.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VerifyFailure};
use crate::fixture::{Fixture, Revision};
use crate::mount::MountMode;

/// How a mounted view is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyPolicy {
    /// Every revision's content, deletions and forbidden paths.
    History,
    /// Final revision's paths exist as directories.
    LatestOnly,
}

impl VerifyPolicy {
    /// Policy used for views mounted in `mode`.
    pub fn for_mode(mode: MountMode) -> Self {
        match mode {
            MountMode::Full | MountMode::Necessary => VerifyPolicy::History,
            MountMode::Latest => VerifyPolicy::LatestOnly,
        }
    }
}

impl fmt::Display for VerifyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyPolicy::History => f.write_str("history"),
            VerifyPolicy::LatestOnly => f.write_str("latest-only"),
        }
    }
}

/// What a successful verification looked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Repositories checked.
    pub repositories: usize,
    /// Revision directories checked.
    pub revisions: usize,
    /// Files whose content was compared.
    pub content_checks: usize,
    /// Deleted or forbidden paths confirmed absent.
    pub absence_checks: usize,
    /// Paths confirmed to be directory markers.
    pub directory_checks: usize,
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} repos, {} revisions, {} contents, {} absences, {} markers",
            self.repositories,
            self.revisions,
            self.content_checks,
            self.absence_checks,
            self.directory_checks
        )
    }
}

/// Checks the view mounted at `mount_root` against `fixture`.
///
/// A single repository is expected directly under `mount_root`; several
/// repositories each get a subdirectory named after them.
pub fn verify(policy: VerifyPolicy, mount_root: &Path, fixture: &Fixture) -> Result<VerifyReport> {
    if fixture.is_empty() {
        return Err(VerifyFailure::EmptyFixture.into());
    }

    let mut report = VerifyReport::default();
    for (repository, revisions) in fixture.repositories() {
        let root = repository_root(mount_root, fixture, repository);
        match policy {
            VerifyPolicy::History => verify_history(repository, &root, revisions, &mut report)?,
            VerifyPolicy::LatestOnly => verify_latest(repository, &root, revisions, &mut report)?,
        }
        report.repositories += 1;
    }

    tracing::debug!(%policy, %report, "verified");
    Ok(report)
}

/// Where a repository's revisions live inside the mounted view.
pub fn repository_root(mount_root: &Path, fixture: &Fixture, repository: &str) -> PathBuf {
    if fixture.is_single_repository() {
        mount_root.to_path_buf()
    } else {
        mount_root.join(repository)
    }
}

/// Sorted revision directory names under `root`.
///
/// Lexicographic order of these names is taken to be chronological order.
/// The history policy pairs them one-to-one with fixture revisions: an
/// extra or missing directory fails verification with
/// [`VerifyFailure::RevisionCountMismatch`] rather than being skipped.
pub fn revision_directories(
    repository: &str,
    root: &Path,
) -> std::result::Result<Vec<String>, VerifyFailure> {
    let unlistable = |error: std::io::Error| VerifyFailure::Unlistable {
        repository: repository.to_string(),
        path: root.to_path_buf(),
        error: error.to_string(),
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(unlistable)? {
        let entry = entry.map_err(unlistable)?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn verify_history(
    repository: &str,
    root: &Path,
    revisions: &[Revision],
    report: &mut VerifyReport,
) -> std::result::Result<(), VerifyFailure> {
    let directories = revision_directories(repository, root)?;
    if directories.len() != revisions.len() {
        return Err(VerifyFailure::RevisionCountMismatch {
            repository: repository.to_string(),
            expected: revisions.len(),
            found: directories,
        });
    }

    let mut previous: Option<&Revision> = None;
    for (revision, directory) in revisions.iter().zip(&directories) {
        let base = root.join(directory);
        tracing::trace!(repository, revision = %directory, "checking revision");

        for (path, expected) in &revision.files {
            let actual = fs::read(base.join(path)).map_err(|e| VerifyFailure::Unreadable {
                repository: repository.to_string(),
                revision: directory.clone(),
                path: path.clone(),
                error: e.to_string(),
            })?;
            if actual != expected.as_bytes() {
                return Err(VerifyFailure::ContentMismatch {
                    repository: repository.to_string(),
                    revision: directory.clone(),
                    path: path.clone(),
                    expected: expected.clone(),
                    actual: String::from_utf8_lossy(&actual).into_owned(),
                });
            }
            report.content_checks += 1;
        }

        if let Some(previous) = previous {
            for path in previous.removed_in(revision) {
                if resolves(&base.join(path)) {
                    return Err(VerifyFailure::DeletedPathVisible {
                        repository: repository.to_string(),
                        revision: directory.clone(),
                        path: path.to_string(),
                    });
                }
                report.absence_checks += 1;
            }
        }

        for path in &revision.forbidden {
            if resolves(&base.join(path)) {
                return Err(VerifyFailure::ForbiddenPathVisible {
                    repository: repository.to_string(),
                    revision: directory.clone(),
                    path: path.clone(),
                });
            }
            report.absence_checks += 1;
        }

        previous = Some(revision);
        report.revisions += 1;
    }

    Ok(())
}

fn verify_latest(
    repository: &str,
    root: &Path,
    revisions: &[Revision],
    report: &mut VerifyReport,
) -> std::result::Result<(), VerifyFailure> {
    let Some(last) = revisions.last() else {
        return Ok(());
    };

    for path in last.files.keys() {
        let metadata = fs::metadata(root.join(path)).map_err(|_| VerifyFailure::MissingPath {
            repository: repository.to_string(),
            path: path.clone(),
        })?;
        if !metadata.is_dir() {
            return Err(VerifyFailure::NotADirectory {
                repository: repository.to_string(),
                path: path.clone(),
            });
        }
        report.directory_checks += 1;
    }

    report.revisions += 1;
    Ok(())
}

/// Any successful stat means the path is visible through the view.
fn resolves(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}
