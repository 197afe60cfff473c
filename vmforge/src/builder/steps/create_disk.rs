//! Step: Create disk.
//!
//! Allocates the virtual hard drive for kvm domains with `qemu-img`. Lxc
//! domains have no disk: the output directory is their root filesystem.

use crate::config::DomainType;
use crate::pipeline::{BuildState, BuildStep, StepAction};
use crate::util::ToolCommand;
use async_trait::async_trait;
use std::path::Path;
use vmforge_shared::errors::ResultExt;

pub struct CreateDiskStep;

#[async_trait]
impl BuildStep for CreateDiskStep {
    fn name(&self) -> &str {
        "create_disk"
    }

    async fn run(&self, state: &mut BuildState) -> StepAction {
        let config = state.config().clone();
        let path = config.disk_path();

        match config.domain_type {
            DomainType::Kvm => {
                state.ui().say("Creating hard drive...");
                let cmd = create_command(
                    &config.tools.qemu_img,
                    &config.disk_type,
                    &path,
                    config.disk_size,
                );
                let result = state
                    .run_tool(&cmd)
                    .await
                    .and_then(|output| output.check(&cmd))
                    .context("Error creating hard drive");
                if let Err(e) = result {
                    return state.halt(e);
                }
                tracing::info!(path = %path.display(), size_mb = config.disk_size, "Created disk image");
                state.set_disk_path(path);
            }
            DomainType::Lxc => {
                state.ui().say("Populate output dir...");
            }
        }

        StepAction::Continue
    }

    // The image always lives inside the output directory, which
    // PrepareOutputDirStep removes on failure.
    async fn cleanup(&self, _state: &mut BuildState) {}
}

pub(crate) fn create_command(qemu_img: &str, format: &str, path: &Path, size_mb: u64) -> ToolCommand {
    ToolCommand::new(qemu_img)
        .args(["create", "-f", format])
        .arg(path)
        .arg(format!("{}M", size_mb))
}
