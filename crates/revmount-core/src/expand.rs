//! Fixture to test-case expansion.
//!
//! Every fixture yields three cases: full-history mount, necessary mount
//! (both checked with the history policy) and latest-only mount. The table
//! is explicit; [`revision_suite!`](crate::revision_suite) turns it into
//! `#[test]` functions.

use std::sync::Arc;

use crate::fixture::{Fixture, NamedFixture};
use crate::mount::MountMode;
use crate::verify::VerifyPolicy;

/// One generated case: a fixture bound to a mount mode and policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// `<fixture>_<mode suffix>`.
    pub name: String,
    /// Shared between the three cases of a fixture.
    pub fixture: Arc<Fixture>,
    /// How the archives are mounted.
    pub mode: MountMode,
    /// How the view is checked.
    pub policy: VerifyPolicy,
}

impl TestCase {
    /// Binds a fixture to a mode; the policy follows from the mode.
    pub fn new(fixture_name: &str, fixture: impl Into<Arc<Fixture>>, mode: MountMode) -> Self {
        Self {
            name: format!("{fixture_name}_{}", mode.suffix()),
            fixture: fixture.into(),
            mode,
            policy: VerifyPolicy::for_mode(mode),
        }
    }
}

/// The three cases of one fixture, in `full`, `necessary`, `last` order.
pub fn expand(named: &NamedFixture) -> [TestCase; 3] {
    let fixture = Arc::new(named.fixture.clone());
    MountMode::ALL.map(|mode| TestCase::new(&named.name, Arc::clone(&fixture), mode))
}

/// Expands a whole table.
pub fn expand_all<'a, I>(table: I) -> Vec<TestCase>
where
    I: IntoIterator<Item = &'a NamedFixture>,
{
    table.into_iter().flat_map(expand).collect()
}

/// Generates `#[test]` functions from a fixture table.
///
/// Each row `name => fixture_expr` becomes a module `name` holding the
/// tests `full`, `necessary` and `last`. The first argument builds the
/// [`Harness`](crate::Harness) each test runs on.
///
/// ```ignore
/// revmount_core::revision_suite! {
///     harness = revmount_core::Harness::simulated();
///     flat_single_file => revmount_core::catalog::flat_single_file(),
/// }
/// ```
#[macro_export]
macro_rules! revision_suite {
    (harness = $harness:expr; $($name:ident => $fixture:expr),+ $(,)?) => {
        $(
            mod $name {
                #[allow(unused_imports)]
                use super::*;

                fn run(mode: $crate::MountMode) {
                    let harness = $harness;
                    let case = $crate::TestCase::new(stringify!($name), $fixture, mode);
                    if let Err(e) = harness.run(&case) {
                        panic!("{}: {e}", case.name);
                    }
                }

                #[test]
                fn full() {
                    run($crate::MountMode::Full);
                }

                #[test]
                fn necessary() {
                    run($crate::MountMode::Necessary);
                }

                #[test]
                fn last() {
                    run($crate::MountMode::Latest);
                }
            }
        )+
    };
}
