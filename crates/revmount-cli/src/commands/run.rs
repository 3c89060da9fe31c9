//! Run command - execute cases and report results.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use revmount_core::{Harness, HarnessConfig, HarnessError, TestCase, VerifyReport};
use tracing::instrument;

use super::Selection;

#[derive(ClapArgs, Clone, Debug)]
pub struct Args {
    #[command(flatten)]
    pub selection: Selection,

    /// Use in-process doubles instead of the backup and mount programs
    #[arg(long)]
    pub simulate: bool,

    /// Stop at the first failing case
    #[arg(long)]
    pub fail_fast: bool,
}

struct Outcome {
    name: String,
    elapsed: Duration,
    result: Result<VerifyReport, HarnessError>,
}

#[instrument(level = "info", name = "cmd::run", skip_all, fields(simulate = args.simulate))]
pub fn execute(args: &Args, config_path: Option<&Path>, quiet: bool) -> Result<()> {
    let cases = args.selection.cases()?;
    if cases.is_empty() {
        eprintln!("No cases match.");
        return Ok(());
    }

    let harness = if args.simulate {
        Harness::simulated()
    } else {
        let config = HarnessConfig::load(config_path).context("Failed to load configuration")?;
        Harness::from_config(config)?
    };

    let outcomes = run_cases(&harness, &cases, args.fail_fast);
    let total = outcomes.len();

    if !quiet {
        println!("{}", outcome_table(&outcomes));
    }

    let mut failures = outcomes.into_iter().filter_map(|outcome| {
        let Outcome { name, result, .. } = outcome;
        result.err().map(|e| (name, e))
    });
    let Some((name, first)) = failures.next() else {
        if !quiet {
            eprintln!("{total} case(s) passed");
        }
        return Ok(());
    };
    let failed = 1 + failures.count();

    // The first failure's kind decides the exit code.
    Err(anyhow::Error::new(first)
        .context(format!("{name} failed"))
        .context(format!("{failed} of {total} case(s) failed")))
}

fn run_cases(harness: &Harness, cases: &[TestCase], fail_fast: bool) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(cases.len());
    for case in cases {
        let started = Instant::now();
        let result = harness.run(case);
        let failed = result.is_err();
        outcomes.push(Outcome {
            name: case.name.clone(),
            elapsed: started.elapsed(),
            result,
        });
        if failed && fail_fast {
            tracing::info!(case = %case.name, "stopping after first failure");
            break;
        }
    }
    outcomes
}

fn outcome_table(outcomes: &[Outcome]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Case", "Result", "Revisions", "Checks", "Time", "Detail"]);

    for outcome in outcomes {
        let (status, revisions, checks, detail) = match &outcome.result {
            Ok(report) => (
                Cell::new("PASS").fg(Color::Green),
                report.revisions.to_string(),
                (report.content_checks + report.absence_checks + report.directory_checks).to_string(),
                String::new(),
            ),
            Err(e) => (
                Cell::new("FAIL").fg(Color::Red),
                "-".to_string(),
                "-".to_string(),
                e.to_string(),
            ),
        };
        table.add_row(vec![
            Cell::new(&outcome.name),
            status,
            Cell::new(revisions),
            Cell::new(checks),
            Cell::new(format!("{:.2?}", outcome.elapsed)),
            Cell::new(detail),
        ]);
    }
    table
}
