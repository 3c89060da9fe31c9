//! List command - show the cases a run would execute.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use revmount_core::TestCase;
use tracing::instrument;

use super::Selection;

#[derive(ClapArgs, Clone, Debug)]
pub struct Args {
    #[command(flatten)]
    pub selection: Selection,
}

#[instrument(level = "info", name = "cmd::list", skip_all)]
pub fn execute(args: &Args, quiet: bool) -> Result<()> {
    let cases = args.selection.cases()?;

    if cases.is_empty() {
        eprintln!("No cases match.");
        return Ok(());
    }

    println!("{}", case_table(&cases));
    if !quiet {
        eprintln!("{} case(s)", cases.len());
    }
    Ok(())
}

fn case_table(cases: &[TestCase]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Case", "Flag", "Policy", "Repositories", "Revisions"]);

    for case in cases {
        table.add_row(vec![
            Cell::new(&case.name),
            Cell::new(case.mode.flag().unwrap_or("-")).fg(Color::Cyan),
            Cell::new(case.policy),
            Cell::new(case.fixture.len()),
            Cell::new(case.fixture.revision_count()),
        ]);
    }
    table
}
