//! Step: Create network.
//!
//! Registers a transient NAT network named after the VM with `virsh
//! net-create`. Cleanup destroys it if it still exists.

use crate::builder::network::render_network_xml;
use crate::pipeline::{BuildState, BuildStep, StepAction};
use crate::util::ToolCommand;
use async_trait::async_trait;
use std::io::Write;
use vmforge_shared::errors::{ResultExt, VmforgeResult};

pub struct CreateNetworkStep;

#[async_trait]
impl BuildStep for CreateNetworkStep {
    fn name(&self) -> &str {
        "create_network"
    }

    async fn run(&self, state: &mut BuildState) -> StepAction {
        let config = state.config().clone();

        let definition = match render_network_xml(&config.vm_name)
            .context("Error processing network template")
        {
            Ok(xml) => xml,
            Err(e) => return state.halt(e),
        };

        // Removed when dropped at the end of this scope, success or not.
        let file = match write_definition(&definition).context("Error creating network") {
            Ok(file) => file,
            Err(e) => return state.halt(e),
        };

        state.ui().say("Creating network...");
        let cmd = virsh(&config.tools.virsh, &config.uri)
            .arg("net-create")
            .arg(file.path());
        let result = state
            .run_tool(&cmd)
            .await
            .and_then(|output| output.check(&cmd))
            .context("Error creating network");

        match result {
            Ok(_) => {
                tracing::info!(network = %config.vm_name, "Registered network");
                StepAction::Continue
            }
            Err(e) => state.halt(e),
        }
    }

    async fn cleanup(&self, state: &mut BuildState) {
        let config = state.config().clone();
        let name = config.vm_name.as_str();

        if !network_exists(state, &config.tools.virsh, &config.uri, name).await {
            tracing::debug!(network = name, "Network not present, nothing to destroy");
            return;
        }

        let cmd = virsh(&config.tools.virsh, &config.uri)
            .arg("net-destroy")
            .arg(name);
        let result = state
            .run_tool_detached(&cmd)
            .await
            .and_then(|output| output.check(&cmd));

        if let Err(e) = result {
            // Someone else may have destroyed it between the check and our call.
            if !network_exists(state, &config.tools.virsh, &config.uri, name).await {
                tracing::debug!(network = name, error = %e, "Network vanished during destroy");
                return;
            }
            tracing::warn!(network = name, error = %e, "Failed to destroy network");
            state
                .ui()
                .error(&format!("Error destroying network: {}", e));
        }
    }
}

fn virsh(program: &str, uri: &str) -> ToolCommand {
    ToolCommand::new(program).arg("-c").arg(uri)
}

async fn network_exists(state: &BuildState, program: &str, uri: &str, name: &str) -> bool {
    let cmd = virsh(program, uri).arg("net-info").arg(name);
    matches!(state.run_tool_detached(&cmd).await, Ok(output) if output.success())
}

fn write_definition(definition: &str) -> VmforgeResult<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("vmforge-net-")
        .suffix(".xml")
        .tempfile()?;
    file.write_all(definition.as_bytes())?;
    file.flush()?;
    file.as_file().sync_all()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::pipeline::testing::{ScriptedRunner, failed_output, harness, ok_output};
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn config() -> BuildConfig {
        BuildConfig {
            vm_name: "packer-web".into(),
            uri: "qemu:///system".into(),
            ..Default::default()
        }
    }

    fn subcommand(cmd: &ToolCommand) -> String {
        cmd.arg_strings()[2].clone()
    }

    #[tokio::test]
    async fn test_run_registers_definition_and_removes_temp_file() {
        let seen: Arc<Mutex<Option<(PathBuf, String)>>> = Arc::new(Mutex::new(None));
        let runner = {
            let seen = seen.clone();
            ScriptedRunner::new(move |cmd| {
                let path = PathBuf::from(&cmd.args[3]);
                let contents = std::fs::read_to_string(&path).unwrap();
                *seen.lock() = Some((path, contents));
                Ok(ok_output("Network packer-web created"))
            })
        };
        let mut h = harness(config(), runner);

        let action = CreateNetworkStep.run(&mut h.state).await;

        assert_eq!(action, StepAction::Continue);
        let calls = h.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "virsh");
        assert_eq!(&calls[0].arg_strings()[..3], ["-c", "qemu:///system", "net-create"]);

        let (path, contents) = seen.lock().clone().unwrap();
        assert!(contents.contains("<name>packer-web</name>"));
        assert!(!path.exists(), "definition file must be removed after run");
    }

    #[tokio::test]
    async fn test_run_failure_halts_and_removes_temp_file() {
        let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let runner = {
            let seen = seen.clone();
            ScriptedRunner::new(move |cmd| {
                *seen.lock() = Some(PathBuf::from(&cmd.args[3]));
                Ok(failed_output(1, "error: network 'packer-web' already exists"))
            })
        };
        let mut h = harness(config(), runner);

        let action = CreateNetworkStep.run(&mut h.state).await;

        assert_eq!(action, StepAction::Halt);
        let msg = h.state.error().unwrap().to_string();
        assert!(msg.starts_with("Error creating network"));
        assert!(msg.contains("already exists"));
        assert!(!seen.lock().clone().unwrap().exists());
    }

    #[tokio::test]
    async fn test_cleanup_destroys_existing_network() {
        let mut h = harness(config(), ScriptedRunner::succeeding());

        CreateNetworkStep.cleanup(&mut h.state).await;

        let calls = h.runner.calls();
        let subcommands: Vec<String> = calls.iter().map(subcommand).collect();
        assert_eq!(subcommands, vec!["net-info", "net-destroy"]);
        assert_eq!(calls[1].arg_strings()[3], "packer-web");
    }

    #[tokio::test]
    async fn test_cleanup_skips_missing_network() {
        let runner = ScriptedRunner::new(|_| {
            Ok(failed_output(1, "error: failed to get network 'packer-web'"))
        });
        let mut h = harness(config(), runner);

        CreateNetworkStep.cleanup(&mut h.state).await;

        let subcommands: Vec<String> = h.runner.calls().iter().map(subcommand).collect();
        assert_eq!(subcommands, vec!["net-info"]);
        assert!(h.ui.errors().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_twice_is_noop_the_second_time() {
        let destroyed = Arc::new(Mutex::new(false));
        let runner = {
            let destroyed = destroyed.clone();
            ScriptedRunner::new(move |cmd| {
                let mut destroyed = destroyed.lock();
                match cmd.arg_strings()[2].as_str() {
                    "net-info" if *destroyed => Ok(failed_output(1, "not found")),
                    "net-destroy" => {
                        *destroyed = true;
                        Ok(ok_output(""))
                    }
                    _ => Ok(ok_output("")),
                }
            })
        };
        let mut h = harness(config(), runner);

        CreateNetworkStep.cleanup(&mut h.state).await;
        CreateNetworkStep.cleanup(&mut h.state).await;

        let subcommands: Vec<String> = h.runner.calls().iter().map(subcommand).collect();
        assert_eq!(subcommands, vec!["net-info", "net-destroy", "net-info"]);
        assert!(h.ui.errors().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_destroy_failure_is_reported_not_fatal() {
        let runner = ScriptedRunner::new(|cmd| match cmd.arg_strings()[2].as_str() {
            "net-destroy" => Ok(failed_output(1, "error: permission denied")),
            _ => Ok(ok_output("")),
        });
        let mut h = harness(config(), runner);

        CreateNetworkStep.cleanup(&mut h.state).await;

        let errors = h.ui.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error destroying network"));
        assert!(errors[0].contains("permission denied"));
    }
}
