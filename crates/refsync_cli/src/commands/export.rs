//! Export command implementation.

use super::{print_summary, until_interrupted, Context};
use crate::error::CliError;
use crate::Outcome;
use tokio::runtime::Runtime;

/// Runs one export of every pending submission.
pub fn run(runtime: &Runtime, context: Context) -> Result<Outcome, CliError> {
    let pipeline = context.pipeline.clone();

    match until_interrupted(runtime, move || pipeline.run_export())? {
        Some(report) => {
            print_summary(&report, context.format)?;
            Ok(Outcome::from_success(report.success))
        }
        None => Ok(Outcome::Interrupted),
    }
}
