//! Step: Prepare output directory.
//!
//! Creates the output directory (deleting a previous one when forced) and,
//! for lxc domains, extracts the root filesystem archive into it. Cleanup
//! removes the whole directory when the build did not complete.

use crate::config::DomainType;
use crate::pipeline::{BuildState, BuildStep, StepAction};
use crate::util::ToolCommand;
use crate::util::fs::{create_dir_all, remove_dir_all_with_retry};
use async_trait::async_trait;
use std::path::Path;
use vmforge_shared::errors::{ResultExt, VmforgeError};

pub struct PrepareOutputDirStep;

#[async_trait]
impl BuildStep for PrepareOutputDirStep {
    fn name(&self) -> &str {
        "prepare_output_dir"
    }

    async fn run(&self, state: &mut BuildState) -> StepAction {
        let config = state.config().clone();
        let output_dir = config.output_dir.as_path();

        if config.force && output_dir.exists() {
            state.ui().say("Deleting previous output directory...");
            if let Err(e) = std::fs::remove_dir_all(output_dir).with_context(|| {
                format!(
                    "Error deleting previous output directory {}",
                    output_dir.display()
                )
            }) {
                return state.halt(e);
            }
        }

        if let Err(e) = create_dir_all(output_dir).with_context(|| {
            format!("Error creating output directory {}", output_dir.display())
        }) {
            return state.halt(e);
        }

        if config.domain_type != DomainType::Lxc {
            return StepAction::Continue;
        }

        let Some(iso_path) = state.iso_path().map(Path::to_path_buf) else {
            return state.halt(VmforgeError::Config(
                "iso_path must be set for lxc domains".into(),
            ));
        };

        state.ui().say("Extracting root filesystem...");
        let cmd = extract_command(&config.tools.tar, output_dir, &iso_path);
        let result = state
            .run_tool(&cmd)
            .await
            .and_then(|output| output.check(&cmd))
            .context("Error extracting");

        match result {
            Ok(_) => StepAction::Continue,
            Err(e) => state.halt(e),
        }
    }

    async fn cleanup(&self, state: &mut BuildState) {
        if !(state.was_cancelled() || state.was_halted()) {
            return;
        }

        let config = state.config().clone();
        state.ui().say("Deleting output directory...");
        if !remove_dir_all_with_retry(&config.output_dir, &config.cleanup_retry).await {
            tracing::error!(
                path = %config.output_dir.display(),
                attempts = config.cleanup_retry.attempts,
                "Giving up removing output dir"
            );
            state.ui().error(&format!(
                "Failed to delete output directory {}",
                config.output_dir.display()
            ));
        }
    }
}

/// Tar flag selecting the decompressor for `archive`, from its last suffix.
pub(crate) fn compression_flag(archive: &Path) -> Option<&'static str> {
    match archive.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Some("-z"),
        Some("xz") => Some("-J"),
        Some("bz2") | Some("bzip2") => Some("-j"),
        _ => None,
    }
}

pub(crate) fn extract_command(tar: &str, output_dir: &Path, archive: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(tar).arg("-C").arg(output_dir);
    if let Some(flag) = compression_flag(archive) {
        cmd = cmd.arg(flag);
    }
    cmd.args(["-x", "-f"]).arg(archive)
}
