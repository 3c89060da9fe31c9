//! Subcommand implementations and the case selection they share.

pub mod list;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use revmount_core::{catalog, expand_all, MountMode, NamedFixture, TestCase};

/// Which cases a command operates on.
#[derive(Args, Clone, Debug, Default)]
pub struct Selection {
    /// Only cases whose name contains this substring
    #[arg(short, long, value_name = "SUBSTRING")]
    pub filter: Option<String>,

    /// Only cases of this mount mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Use fixtures from this TOML file instead of the built-in catalog
    #[arg(long, value_name = "FILE")]
    pub fixtures: Option<PathBuf>,
}

/// Mount mode as spelled in case names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Full history (`-f`)
    Full,
    /// Necessary revisions only (no flag)
    Necessary,
    /// Latest revision only (`-l`)
    Last,
}

impl From<ModeArg> for MountMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => MountMode::Full,
            ModeArg::Necessary => MountMode::Necessary,
            ModeArg::Last => MountMode::Latest,
        }
    }
}

impl Selection {
    /// Expands the selected fixtures and applies the filters.
    pub fn cases(&self) -> Result<Vec<TestCase>> {
        let fixtures: Vec<NamedFixture> = match &self.fixtures {
            Some(path) => catalog::load(path)
                .with_context(|| format!("Failed to load fixtures from {}", path.display()))?,
            None => catalog::all(),
        };

        let mode = self.mode.map(MountMode::from);
        Ok(expand_all(&fixtures)
            .into_iter()
            .filter(|case| mode.is_none_or(|mode| case.mode == mode))
            .filter(|case| {
                self.filter
                    .as_deref()
                    .is_none_or(|filter| case.name.contains(filter))
            })
            .collect())
    }
}
