//! Declarative description of multi-revision backup histories.
//!
//! A [`Fixture`] maps repository names to a chronological list of
//! [`Revision`]s. Each revision is an absolute snapshot: the builder empties
//! the source tree before materializing it, so anything not listed is absent
//! at that point in time.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Complete desired state of a source tree at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Relative path to file content.
    pub files: BTreeMap<String, String>,
    /// Paths that must not resolve inside this revision's mounted view.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub forbidden: BTreeSet<String>,
}

impl Revision {
    /// Creates a revision with no forbidden paths.
    pub fn new<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(path, content)| (path.into(), content.into()))
                .collect(),
            forbidden: BTreeSet::new(),
        }
    }

    /// Adds paths that must not be visible in this revision.
    #[must_use]
    pub fn forbid<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.forbidden.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Paths listed in `self` but not in `next`.
    pub fn removed_in<'a>(&'a self, next: &'a Revision) -> impl Iterator<Item = &'a str> + 'a {
        self.files
            .keys()
            .filter(move |path| !next.files.contains_key(*path))
            .map(String::as_str)
    }
}

/// Repository name to chronological revision history.
///
/// Repositories are kept sorted by name; their order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixture {
    repositories: BTreeMap<String, Vec<Revision>>,
}

impl Fixture {
    /// Creates an empty fixture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a repository history.
    #[must_use]
    pub fn with_repository<I>(mut self, name: impl Into<String>, revisions: I) -> Self
    where
        I: IntoIterator<Item = Revision>,
    {
        self.repositories
            .insert(name.into(), revisions.into_iter().collect());
        self
    }

    /// Iterates repositories in name order.
    pub fn repositories(&self) -> impl Iterator<Item = (&str, &[Revision])> {
        self.repositories
            .iter()
            .map(|(name, revisions)| (name.as_str(), revisions.as_slice()))
    }

    /// Repository names in name order.
    pub fn repository_names(&self) -> impl Iterator<Item = &str> {
        self.repositories.keys().map(String::as_str)
    }

    /// Revisions of one repository.
    pub fn revisions(&self, repository: &str) -> Option<&[Revision]> {
        self.repositories.get(repository).map(Vec::as_slice)
    }

    /// Number of repositories.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Whether the fixture has no repositories.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// A single-repository fixture is mounted directly at the mount root.
    pub fn is_single_repository(&self) -> bool {
        self.repositories.len() == 1
    }

    /// Total number of revisions across all repositories.
    pub fn revision_count(&self) -> usize {
        self.repositories.values().map(Vec::len).sum()
    }

    /// Same fixture with every repository's history in reverse order.
    ///
    /// Turns a growing history into a shrinking one.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            repositories: self
                .repositories
                .iter()
                .map(|(name, revisions)| (name.clone(), revisions.iter().rev().cloned().collect()))
                .collect(),
        }
    }

    /// Checks that the fixture can be materialized and mounted.
    pub fn validate(&self) -> Result<()> {
        if self.repositories.is_empty() {
            return Err(HarnessError::invalid_fixture("no repositories"));
        }

        for (name, revisions) in &self.repositories {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(HarnessError::invalid_fixture(format!(
                    "repository name {name:?} is not a single path component"
                )));
            }
            if revisions.is_empty() {
                return Err(HarnessError::invalid_fixture(format!(
                    "repository '{name}' has no revisions"
                )));
            }

            for (index, revision) in revisions.iter().enumerate() {
                for path in revision.files.keys().chain(&revision.forbidden) {
                    if !is_relative_path(path) {
                        return Err(HarnessError::invalid_fixture(format!(
                            "repository '{name}', revision {index}: {path:?} is not a plain relative path"
                        )));
                    }
                }
                if let Some(path) = revision
                    .forbidden
                    .iter()
                    .find(|path| revision.files.keys().any(|file| is_same_or_ancestor(path, file)))
                {
                    return Err(HarnessError::invalid_fixture(format!(
                        "repository '{name}', revision {index}: '{path}' is both present and forbidden"
                    )));
                }
                if let Some((parent, child)) = revision.files.keys().find_map(|parent| {
                    revision
                        .files
                        .keys()
                        .find(|child| *child != parent && is_same_or_ancestor(parent, child))
                        .map(|child| (parent, child))
                }) {
                    return Err(HarnessError::invalid_fixture(format!(
                        "repository '{name}', revision {index}: file '{parent}' is also the parent of '{child}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Reverses the revision order of every repository in `fixture`.
pub fn reverse_revisions(fixture: &Fixture) -> Fixture {
    fixture.reversed()
}

/// A fixture together with the name its generated cases are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFixture {
    /// Case name prefix, e.g. `flat_single_file`.
    pub name: String,
    /// The history itself.
    pub fixture: Fixture,
}

impl NamedFixture {
    /// Pairs a name with a fixture.
    pub fn new(name: impl Into<String>, fixture: Fixture) -> Self {
        Self {
            name: name.into(),
            fixture,
        }
    }
}

/// `ancestor` equals `path` or is one of its parent directories.
fn is_same_or_ancestor(ancestor: &str, path: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.ends_with('/')
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn growing() -> Fixture {
        Fixture::new().with_repository(
            "backup",
            [
                Revision::new([("file1", "1")]),
                Revision::new([("file1", "1"), ("file2", "2")]),
            ],
        )
    }

    #[test]
    fn test_forbidden_defaults_to_empty() {
        let revision = Revision::new([("file", "content")]);
        assert!(revision.forbidden.is_empty());
    }

    #[test]
    fn test_removed_in() {
        let before = Revision::new([("a", "1"), ("b", "1")]);
        let after = Revision::new([("b", "2")]);
        assert_eq!(before.removed_in(&after).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(after.removed_in(&before).count(), 0);
    }

    #[test]
    fn test_reversed_keeps_names_and_contents() {
        let reversed = growing().reversed();
        let revisions = reversed.revisions("backup").unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].files.len(), 2);
        assert_eq!(revisions[1].files.len(), 1);
        assert_eq!(reverse_revisions(&reversed), growing());
    }

    #[test]
    fn test_validate_accepts_nested_paths() {
        let fixture = Fixture::new().with_repository(
            "nested_backup",
            [Revision::new([("file", "1")]).forbid(["dir", "dir/file"])],
        );
        fixture.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_fixture() {
        assert!(matches!(
            Fixture::new().validate(),
            Err(HarnessError::InvalidFixture { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_repository_without_revisions() {
        let fixture = Fixture::new().with_repository("repo", []);
        assert!(fixture.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_escaping_paths() {
        for path in ["/etc/passwd", "../outside", "dir/../file", "", "dir/", "./file"] {
            let fixture = Fixture::new().with_repository("repo", [Revision::new([(path, "x")])]);
            assert!(fixture.validate().is_err(), "accepted {path:?}");
        }
    }

    #[test]
    fn test_validate_rejects_bad_repository_name() {
        let fixture = Fixture::new().with_repository("a/b", [Revision::new([("file", "x")])]);
        assert!(fixture.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_present_and_forbidden() {
        let fixture = Fixture::new()
            .with_repository("repo", [Revision::new([("file", "x")]).forbid(["file"])]);
        assert!(fixture.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_forbidden_parent_of_present_file() {
        let fixture = Fixture::new()
            .with_repository("repo", [Revision::new([("dir/file", "x")]).forbid(["dir"])]);
        assert!(matches!(
            fixture.validate(),
            Err(HarnessError::InvalidFixture { ref reason }) if reason.contains("'dir'")
        ));
    }

    #[test]
    fn test_validate_rejects_file_that_is_also_a_directory() {
        let fixture = Fixture::new()
            .with_repository("repo", [Revision::new([("dir", "a"), ("dir/file", "b")])]);
        assert!(matches!(
            fixture.validate(),
            Err(HarnessError::InvalidFixture { ref reason }) if reason.contains("parent of 'dir/file'")
        ));
    }

    #[test]
    fn test_validate_accepts_sibling_with_shared_prefix() {
        // `dir2` shares a string prefix with `dir` but is not inside it.
        let fixture = Fixture::new().with_repository(
            "repo",
            [Revision::new([("dir", "a"), ("dir2/file", "b")]).forbid(["di", "dir2/other"])],
        );
        fixture.validate().unwrap();
    }

    #[test]
    fn test_toml_shape() {
        let text = r#"
            repo = [
                { files = { file1 = "1" }, forbidden = ["file2"] },
                { files = { file1 = "2", file2 = "1" } },
            ]
        "#;
        let fixture: Fixture = toml::from_str(text).unwrap();
        let revisions = fixture.revisions("repo").unwrap();
        assert_eq!(revisions[0].forbidden.len(), 1);
        assert!(revisions[1].forbidden.is_empty());
        assert_eq!(revisions[1].files["file2"], "1");
    }

    fn arb_fixture() -> impl Strategy<Value = Fixture> {
        let revision = prop::collection::btree_map("[a-z]{1,4}", "[a-z0-9 ]{0,8}", 0..4)
            .prop_map(|files| Revision {
                files,
                forbidden: BTreeSet::new(),
            });
        prop::collection::btree_map("[a-z]{1,6}", prop::collection::vec(revision, 1..6), 1..4)
            .prop_map(|repositories| Fixture { repositories })
    }

    proptest! {
        #[test]
        fn prop_reversal_is_involution(fixture in arb_fixture()) {
            prop_assert_eq!(fixture.reversed().reversed(), fixture);
        }

        #[test]
        fn prop_reversal_preserves_shape(fixture in arb_fixture()) {
            let reversed = fixture.reversed();
            prop_assert_eq!(reversed.len(), fixture.len());
            prop_assert_eq!(reversed.revision_count(), fixture.revision_count());
            for (name, revisions) in fixture.repositories() {
                let flipped = reversed.revisions(name).unwrap();
                prop_assert_eq!(flipped.first(), revisions.last());
                prop_assert_eq!(flipped.last(), revisions.first());
            }
        }
    }
}
