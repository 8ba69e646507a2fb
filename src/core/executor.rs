//! Executor: runs a rendered plan line by line.
//!
//! One child at a time, in plan order, blocking on each. The first line that
//! does not succeed moves the run to `Failed` and nothing after it launches.

use super::types::*;
use crate::journal::EventLog;
use crate::transport::{ExecOutput, Transport, TransportError};
use std::time::Instant;

/// Per-run execution switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions<'a> {
    /// Echo every line and launch nothing
    pub dry_run: bool,

    /// Suppress echoing of lines
    pub quiet: bool,

    pub journal: Option<&'a EventLog>,
}

/// Execute the plan, halting on the first failing line.
pub fn execute(
    plan: &ExecutionPlan,
    transport: &mut dyn Transport,
    options: &ExecuteOptions,
) -> ExecutionResult {
    let start = Instant::now();

    if options.dry_run {
        for cmd in plan.steps.iter().flat_map(|s| s.commands.iter()) {
            eprintln!("{}", cmd.command);
        }
        return ExecutionResult {
            state: RunState::Succeeded,
            failure: None,
            lines_run: 0,
            duration: start.elapsed(),
        };
    }

    tracing::info!(root = %plan.root, recipes = plan.steps.len(), "run started");
    let mut state = RunState::NotStarted;
    let mut failure = None;
    let mut lines_run = 0;

    'plan: for (recipe_index, step) in plan.steps.iter().enumerate() {
        let recipe = &step.recipe.name;
        record(options, |run_id| RunEvent::RecipeStarted {
            run_id,
            recipe: recipe.clone(),
        });

        for (line_index, cmd) in step.commands.iter().enumerate() {
            state = RunState::Running {
                recipe_index,
                line_index,
            };
            tracing::debug!(%state, command = %cmd.command, "launching line");
            if cmd.echo && !options.quiet {
                eprintln!("{}", cmd.command);
            }

            let line_start = Instant::now();
            let outcome = classify(transport.run(&cmd.command));
            lines_run += 1;

            record(options, |run_id| RunEvent::LineFinished {
                run_id,
                recipe: recipe.clone(),
                line: line_index,
                exit_code: outcome.map_or(0, |s| s.exit_code()),
                duration_seconds: line_start.elapsed().as_secs_f64(),
            });

            if let Some(status) = outcome {
                state = RunState::Failed {
                    recipe_index,
                    line_index,
                    status,
                };
                failure = Some(ExecutionFailure {
                    recipe: recipe.clone(),
                    recipe_index,
                    line_index,
                    source_line: cmd.line,
                    status,
                });
                break 'plan;
            }
        }
    }

    if !state.is_terminal() {
        state = RunState::Succeeded;
    }

    let result = ExecutionResult {
        state,
        failure,
        lines_run,
        duration: start.elapsed(),
    };
    record(options, |run_id| RunEvent::RunCompleted {
        run_id,
        success: result.success(),
        lines_run: result.lines_run,
        total_seconds: result.duration.as_secs_f64(),
    });
    tracing::info!(
        state = %result.state,
        lines_run = result.lines_run,
        seconds = result.duration.as_secs_f64(),
        "run finished"
    );
    result
}

/// `None` when the line succeeded, otherwise why it did not.
fn classify(outcome: Result<ExecOutput, TransportError>) -> Option<ExitStatus> {
    let out = match outcome {
        Ok(out) => out,
        Err(e) => {
            tracing::error!(error = %e, "cannot launch line");
            return Some(ExitStatus::SpawnFailed);
        }
    };
    if let Some(sig) = out.interrupted {
        return Some(ExitStatus::Interrupted(sig));
    }
    match (out.exit_code, out.signal) {
        (Some(0), _) => None,
        (Some(code), _) => Some(ExitStatus::Code(code)),
        (None, Some(sig)) => Some(ExitStatus::Signal(sig)),
        (None, None) => Some(ExitStatus::Code(1)),
    }
}

fn record(options: &ExecuteOptions, event: impl FnOnce(String) -> RunEvent) {
    if let Some(journal) = options.journal {
        journal.record(event(journal.run_id().to_string()));
    }
}
