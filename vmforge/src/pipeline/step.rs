//! Step trait for pipeline execution.

use super::state::BuildState;
use async_trait::async_trait;

/// What a step's forward action asks the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop: the step failed and recorded its error in the state.
    Halt,
    /// Stop: the step observed an external cancellation.
    Cancelled,
}

/// A unit of pipeline work with a forward action and a compensating action.
///
/// `cleanup` runs for every step whose `run` was started, in reverse order,
/// whether or not `run` succeeded. It must therefore not assume `run`
/// completed, must tolerate being called twice, and must never fail loudly:
/// report problems through the UI or logs and return.
#[async_trait]
pub trait BuildStep: Send + Sync {
    /// Human-readable step name for logging and metrics.
    fn name(&self) -> &str;

    async fn run(&self, state: &mut BuildState) -> StepAction;

    async fn cleanup(&self, state: &mut BuildState);
}

pub type BoxedStep = Box<dyn BuildStep>;
