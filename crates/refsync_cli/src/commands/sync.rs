//! Sync command implementation.

use super::{print_summary, until_interrupted, Context};
use crate::error::CliError;
use crate::Outcome;
use tokio::runtime::Runtime;

/// Runs one reconciliation of all entities, or of `entities` when given.
pub fn run(runtime: &Runtime, context: Context, entities: Vec<String>) -> Result<Outcome, CliError> {
    let orchestrator = context.orchestrator.clone();
    let job = move || {
        if entities.is_empty() {
            orchestrator.run_all()
        } else {
            orchestrator.run_selected(entities.as_slice())
        }
    };

    match until_interrupted(runtime, job)? {
        Some(summary) => {
            print_summary(&summary, context.format)?;
            Ok(Outcome::from_success(summary.success))
        }
        None => Ok(Outcome::Interrupted),
    }
}
