//! Shared build state threaded through every step.

use super::step::StepAction;
use crate::config::BuildConfig;
use crate::ui::BuildUi;
use crate::util::{CancelToken, CommandOutput, CommandRunner, ToolCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vmforge_shared::errors::{VmforgeError, VmforgeResult};

/// Why forward execution stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Halted,
    Cancelled,
}

/// Mutable context for one build.
///
/// Inputs (config, UI, tool runner, cancellation) are fixed at construction.
/// Artifacts are written by the step that produces them; a step may only rely
/// on artifacts from steps that ran before it.
pub struct BuildState {
    config: Arc<BuildConfig>,
    ui: Arc<dyn BuildUi>,
    runner: Arc<dyn CommandRunner>,
    cancel: CancelToken,

    // Artifacts
    iso_path: Option<PathBuf>,
    disk_path: Option<PathBuf>,

    // Outcome
    error: Option<VmforgeError>,
    termination: Option<Termination>,
}

impl BuildState {
    pub fn new(
        config: Arc<BuildConfig>,
        ui: Arc<dyn BuildUi>,
        runner: Arc<dyn CommandRunner>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            ui,
            runner,
            cancel,
            iso_path: None,
            disk_path: None,
            error: None,
            termination: None,
        }
    }

    pub fn config(&self) -> &Arc<BuildConfig> {
        &self.config
    }

    pub fn ui(&self) -> &dyn BuildUi {
        self.ui.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn iso_path(&self) -> Option<&Path> {
        self.iso_path.as_deref()
    }

    pub fn set_iso_path(&mut self, path: PathBuf) {
        self.iso_path = Some(path);
    }

    pub fn disk_path(&self) -> Option<&Path> {
        self.disk_path.as_deref()
    }

    pub fn set_disk_path(&mut self, path: PathBuf) {
        self.disk_path = Some(path);
    }

    pub fn error(&self) -> Option<&VmforgeError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<VmforgeError> {
        self.error.take()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn was_halted(&self) -> bool {
        self.termination == Some(Termination::Halted)
    }

    pub fn was_cancelled(&self) -> bool {
        self.termination == Some(Termination::Cancelled)
    }

    pub(crate) fn terminate(&mut self, termination: Termination) {
        self.termination = Some(termination);
    }

    /// Record a step failure and decide the step's action.
    ///
    /// Cancellation is reported as [`StepAction::Cancelled`] without being
    /// recorded as the build error.
    pub fn halt(&mut self, err: VmforgeError) -> StepAction {
        if err.is_cancelled() {
            return StepAction::Cancelled;
        }
        self.ui.error(&err.to_string());
        self.error = Some(err);
        StepAction::Halt
    }

    /// Run a tool during the forward phase. Cancellation kills the tool.
    pub async fn run_tool(&self, cmd: &ToolCommand) -> VmforgeResult<CommandOutput> {
        self.runner.run(cmd, Some(&self.cancel)).await
    }

    /// Run a tool during cleanup. Not interruptible: unwinding must finish
    /// even after the build was cancelled.
    pub async fn run_tool_detached(&self, cmd: &ToolCommand) -> VmforgeResult<CommandOutput> {
        self.runner.run(cmd, None).await
    }
}
