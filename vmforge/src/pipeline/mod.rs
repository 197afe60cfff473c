//! Sequential step pipeline with compensating cleanup.
//!
//! ## Architecture
//!
//! ```text
//! PipelineExecutor → BuildStep::run (in order) → BuildStep::cleanup (reverse)
//!        │
//!        └── &mut BuildState threaded through every call
//! ```
//!
//! - `BuildStep`: unit of work with a forward action and a compensating action
//! - `BuildState`: typed shared context (config, UI, tool runner, artifacts)
//! - `PipelineExecutor`: runs steps, observes Halt/cancellation, unwinds
//!
//! ## Example
//!
//! ```ignore
//! use vmforge::pipeline::{BoxedStep, BuildState, PipelineExecutor};
//!
//! let steps: Vec<BoxedStep> = vec![Box::new(StepA), Box::new(StepB)];
//! let mut state = BuildState::new(config, ui, runner, cancel);
//! let report = PipelineExecutor::execute(&steps, &mut state).await;
//! println!("pipeline took {}ms", report.metrics.total_duration_ms);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod state;
mod step;

#[cfg(test)]
pub(crate) mod testing;

pub use metrics::{PipelineMetrics, StepMetrics};
pub use pipeline::{PipelineExecutor, PipelineOutcome, PipelineReport};
pub use state::{BuildState, Termination};
pub use step::{BoxedStep, BuildStep, StepAction};
