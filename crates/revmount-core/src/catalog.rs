//! Built-in fixtures.
//!
//! Each function returns one history; [`all`] lists them under the names
//! their generated cases use.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{HarnessError, Result};
use crate::fixture::{Fixture, NamedFixture, Revision};

/// Number of revisions in the large fixtures.
pub const LARGE_REVISIONS: usize = 20;

/// One file rewritten once.
pub fn flat_single_file() -> Fixture {
    Fixture::new().with_repository(
        "backup",
        [
            Revision::new([("file", "content")]),
            Revision::new([("file", "new content")]),
        ],
    )
}

/// Two files rewritten together.
pub fn flat_two_files() -> Fixture {
    Fixture::new().with_repository(
        "backup",
        [
            Revision::new([("file1", "content1"), ("file2", "content2")]),
            Revision::new([("file1", "new content 1"), ("file2", "new content 2")]),
        ],
    )
}

/// One new file per revision.
pub fn flat_adding_files() -> Fixture {
    Fixture::new().with_repository(
        "backup",
        [
            Revision::new([("file1", "content1")]),
            Revision::new([("file1", "content1"), ("file2", "content2")]),
            Revision::new([
                ("file1", "content1"),
                ("file2", "content2"),
                ("file3", "content3"),
            ]),
            Revision::new([
                ("file1", "content1"),
                ("file2", "content2"),
                ("file3", "content3"),
                ("file4", "content4"),
            ]),
        ],
    )
}

/// [`flat_adding_files`] played backwards.
pub fn flat_removing_files() -> Fixture {
    flat_adding_files().reversed()
}

/// A file inside a directory rewritten once.
pub fn nested_single_file() -> Fixture {
    Fixture::new().with_repository(
        "nested_backup",
        [
            Revision::new([("dir/file", "content")]),
            Revision::new([("dir/file", "new content")]),
        ],
    )
}

/// Top-level and nested file rewritten together.
pub fn nested_two_files() -> Fixture {
    Fixture::new().with_repository(
        "nested_backup",
        [
            Revision::new([("file", "content"), ("dir/file", "content 2")]),
            Revision::new([("file", "new content"), ("dir/file", "new content 2")]),
        ],
    )
}

/// One directory level deeper per revision.
pub fn nested_adding_files() -> Fixture {
    Fixture::new().with_repository(
        "nested_backup",
        [
            Revision::new([("file", "1")]).forbid(["dir/file"]),
            Revision::new([("file", "2"), ("dir/file", "2")]).forbid(["dir/dir/file"]),
            Revision::new([("file", "3"), ("dir/file", "3"), ("dir/dir/file", "3")]),
            Revision::new([
                ("file", "4"),
                ("dir/file", "4"),
                ("dir/dir/file", "4"),
                ("dir/dir/dir/file", "4"),
            ]),
        ],
    )
}

/// [`nested_adding_files`] played backwards.
pub fn nested_removing_files() -> Fixture {
    nested_adding_files().reversed()
}

/// Two repositories with identical histories mounted side by side.
pub fn multiple_repo_single_file() -> Fixture {
    let history = || {
        [
            Revision::new([("file", "content")]),
            Revision::new([("file", "new content")]),
        ]
    };
    Fixture::new()
        .with_repository("first", history())
        .with_repository("second", history())
}

/// A file added later must not show up in the earlier revision.
pub fn future_files_flat() -> Fixture {
    Fixture::new().with_repository(
        "repo",
        [
            Revision::new([("file1", "1")]).forbid(["file2"]),
            Revision::new([("file1", "2"), ("file2", "1")]),
        ],
    )
}

/// A directory added later must not show up in the earlier revision.
pub fn future_files_nested() -> Fixture {
    Fixture::new().with_repository(
        "repo",
        [
            Revision::new([("file", "1")]).forbid(["dir", "dir/file"]),
            Revision::new([("file", "1"), ("dir/file", "1")]),
        ],
    )
}

/// Many revisions of one file.
pub fn large_single() -> Fixture {
    Fixture::new().with_repository("first", counting_history("file"))
}

/// Many revisions in two repositories.
pub fn large_multi() -> Fixture {
    Fixture::new()
        .with_repository("first", counting_history("first"))
        .with_repository("second", counting_history("second"))
}

fn counting_history(path: &str) -> Vec<Revision> {
    (0..LARGE_REVISIONS)
        .map(|value| Revision::new([(path, value.to_string())]))
        .collect()
}

/// Every built-in fixture with its case name prefix.
pub fn all() -> Vec<NamedFixture> {
    vec![
        NamedFixture::new("flat_single_file", flat_single_file()),
        NamedFixture::new("flat_two_files", flat_two_files()),
        NamedFixture::new("flat_adding_files", flat_adding_files()),
        NamedFixture::new("flat_removing_files", flat_removing_files()),
        NamedFixture::new("nested_single_file", nested_single_file()),
        NamedFixture::new("nested_two_files", nested_two_files()),
        NamedFixture::new("nested_adding_files", nested_adding_files()),
        NamedFixture::new("nested_removing_files", nested_removing_files()),
        NamedFixture::new("multiple_repo_single_file", multiple_repo_single_file()),
        NamedFixture::new("future_files_flat", future_files_flat()),
        NamedFixture::new("future_files_nested", future_files_nested()),
        NamedFixture::new("large_single", large_single()),
        NamedFixture::new("large_multi", large_multi()),
    ]
}

/// Layout of a fixture file: `[fixtures.<name>]` tables of repositories.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    fixtures: BTreeMap<String, Fixture>,
}

/// Parses additional fixtures from TOML text.
///
/// ```toml
/// [fixtures.renamed_file]
/// repo = [
///   { files = { old = "1" } },
///   { files = { new = "1" }, forbidden = ["old"] },
/// ]
/// ```
///
/// Every fixture is validated; the first invalid one is reported by name.
pub fn from_toml(content: &str) -> Result<Vec<NamedFixture>> {
    let file: FixtureFile = toml::from_str(content).map_err(|e| HarnessError::InvalidFixture {
        reason: e.to_string(),
    })?;
    file.fixtures
        .into_iter()
        .map(|(name, fixture)| {
            fixture.validate().map_err(|e| match e {
                HarnessError::InvalidFixture { reason } => HarnessError::InvalidFixture {
                    reason: format!("{name}: {reason}"),
                },
                other => other,
            })?;
            Ok(NamedFixture::new(name, fixture))
        })
        .collect()
}

/// Reads a fixture file.
pub fn load(path: &Path) -> Result<Vec<NamedFixture>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| HarnessError::io(format!("reading fixture file {}", path.display()), e))?;
    from_toml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_fixtures_are_valid() {
        for named in all() {
            named
                .fixture
                .validate()
                .unwrap_or_else(|e| panic!("{}: {e}", named.name));
        }
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<_> = all().into_iter().map(|named| named.name).collect();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn test_removing_mirrors_adding() {
        let adding = nested_adding_files();
        let removing = nested_removing_files();
        let forward = adding.revisions("nested_backup").unwrap();
        let backward = removing.revisions("nested_backup").unwrap();
        assert_eq!(forward.first(), backward.last());
        assert_eq!(backward[0].files.len(), 4);
        // The forbidden markers travel with their revision.
        assert!(backward[3].forbidden.contains("dir/file"));
    }

    #[test]
    fn test_from_toml() {
        let fixtures = from_toml(
            r#"
            [fixtures.renamed_file]
            repo = [
              { files = { old = "1" } },
              { files = { new = "1" }, forbidden = ["old"] },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].name, "renamed_file");
        let revisions = fixtures[0].fixture.revisions("repo").unwrap();
        assert!(revisions[1].forbidden.contains("old"));
    }

    #[test]
    fn test_from_toml_reports_invalid_fixture_by_name() {
        let err = from_toml(
            r#"
            [fixtures.escape]
            repo = [{ files = { "../outside" = "x" } }]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidFixture { ref reason } if reason.starts_with("escape:")));
    }

    #[test]
    fn test_from_toml_rejects_unknown_tables() {
        assert!(from_toml("[fixture.typo]\nrepo = []\n").is_err());
    }

    #[test]
    fn test_large_fixture_shape() {
        let fixture = large_multi();
        assert_eq!(fixture.len(), 2);
        assert_eq!(fixture.revision_count(), 2 * LARGE_REVISIONS);
        let last = fixture.revisions("second").unwrap().last().unwrap();
        assert_eq!(last.files["second"], "19");
    }
}
