//! Test doubles for driving steps without hypervisor tools.

use super::state::BuildState;
use crate::config::BuildConfig;
use crate::ui::MemoryUi;
use crate::util::{CancelToken, CommandOutput, CommandRunner, ToolCommand};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use vmforge_shared::errors::VmforgeResult;

type Responder = dyn Fn(&ToolCommand) -> VmforgeResult<CommandOutput> + Send + Sync;

/// Records every command and answers with a closure.
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<ToolCommand>>,
    respond: Box<Responder>,
}

impl ScriptedRunner {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&ToolCommand) -> VmforgeResult<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Every command exits 0 with empty output.
    pub(crate) fn succeeding() -> Self {
        Self::new(|_| Ok(ok_output("")))
    }

    pub(crate) fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        cmd: &ToolCommand,
        _cancel: Option<&CancelToken>,
    ) -> VmforgeResult<CommandOutput> {
        self.calls.lock().push(cmd.clone());
        (self.respond)(cmd)
    }
}

pub(crate) fn ok_output(output: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        output: output.to_string(),
    }
}

pub(crate) fn failed_output(code: i32, output: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        output: output.to_string(),
    }
}

pub(crate) struct Harness {
    pub(crate) state: BuildState,
    pub(crate) ui: Arc<MemoryUi>,
    pub(crate) runner: Arc<ScriptedRunner>,
}

pub(crate) fn harness(config: BuildConfig, runner: ScriptedRunner) -> Harness {
    let ui = Arc::new(MemoryUi::new());
    let runner = Arc::new(runner);
    let state = BuildState::new(
        Arc::new(config),
        ui.clone(),
        runner.clone(),
        CancelToken::new(),
    );
    Harness { state, ui, runner }
}
