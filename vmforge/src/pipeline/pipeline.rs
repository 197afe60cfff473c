//! Step pipeline executor.
//!
//! Runs steps strictly in order and, however forward execution ends, offers
//! every started step its cleanup in reverse order.

use super::metrics::{PipelineMetrics, StepMetrics};
use super::state::{BuildState, Termination};
use super::step::{BoxedStep, StepAction};
use std::time::Instant;

/// How forward execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    Halted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    /// Number of steps whose `run` was started (and therefore cleaned up).
    pub started: usize,
    pub metrics: PipelineMetrics,
}

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute `steps` against `state`.
    ///
    /// Cancellation is checked at every step boundary; a step may also report
    /// it directly when an in-flight tool was interrupted. The executor never
    /// inspects step errors, they stay recorded in `state` for the caller.
    pub async fn execute(steps: &[BoxedStep], state: &mut BuildState) -> PipelineReport {
        let total_start = Instant::now();
        let mut step_metrics = Vec::with_capacity(steps.len());
        let mut started = 0;

        for step in steps {
            if state.cancel_token().is_cancelled() {
                tracing::info!(next_step = step.name(), "Build cancelled, stopping");
                state.terminate(Termination::Cancelled);
                break;
            }

            started += 1;
            tracing::debug!(step = step.name(), "Running step");
            let step_start = Instant::now();
            let action = step.run(state).await;
            step_metrics.push(StepMetrics {
                name: step.name().to_string(),
                duration_ms: step_start.elapsed().as_millis(),
                action,
            });

            match action {
                StepAction::Continue => {}
                StepAction::Halt => {
                    tracing::warn!(step = step.name(), "Step halted the build");
                    state.terminate(Termination::Halted);
                    break;
                }
                StepAction::Cancelled => {
                    tracing::info!(step = step.name(), "Step observed cancellation");
                    state.terminate(Termination::Cancelled);
                    break;
                }
            }
        }

        for step in steps[..started].iter().rev() {
            tracing::debug!(step = step.name(), "Cleaning up step");
            step.cleanup(state).await;
        }

        let outcome = match state.termination() {
            None => PipelineOutcome::Completed,
            Some(Termination::Halted) => PipelineOutcome::Halted,
            Some(Termination::Cancelled) => PipelineOutcome::Cancelled,
        };

        let metrics = PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            steps: step_metrics,
        };
        metrics.log_steps();

        PipelineReport {
            outcome,
            started,
            metrics,
        }
    }
}
