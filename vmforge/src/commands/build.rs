//! `vmforge build`: run the provisioning pipeline against a local template.

use super::{EXIT_BUILD_FAILED, EXIT_SUCCESS, report_parse_error};
use crate::builder::LibvirtBuilder;
use crate::config::BuildConfig;
use crate::ui::{BuildUi, ConsoleUi};
use crate::util::{CancelToken, ProcessRunner};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Parser)]
#[command(name = "build")]
pub struct BuildArgs {
    /// Delete an existing output directory before building
    #[arg(long)]
    pub force: bool,

    /// JSON build template
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,
}

/// Run a build. Returns 0 on success, 1 on any failure or interruption.
pub async fn run(args: BuildArgs) -> i32 {
    let ui = Arc::new(ConsoleUi::new("libvirt"));

    let mut config = match BuildConfig::from_path(&args.template) {
        Ok(config) => config,
        Err(e) => {
            ui.error(&format!("Failed to load template: {}", e));
            return EXIT_BUILD_FAILED;
        }
    };
    if args.force {
        config.force = true;
    }

    tracing::info!(template = %args.template.display(), vm = %config.vm_name, "Starting build");

    let cancel = CancelToken::new();
    let interrupt = watch_interrupt(cancel.clone());
    let result = LibvirtBuilder::new(config)
        .run(ui.clone(), Arc::new(ProcessRunner), cancel)
        .await;
    interrupt.abort();

    match result {
        Ok(artifact) => {
            ui.say(&format!(
                "Build finished. Output directory: {}",
                artifact.output_dir.display()
            ));
            if let Some(disk) = &artifact.disk_path {
                ui.say(&format!("Disk image: {}", disk.display()));
            }
            EXIT_SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            ui.error("Build was cancelled.");
            EXIT_BUILD_FAILED
        }
        Err(e) => {
            ui.error(&format!("Build errored: {}", e));
            EXIT_BUILD_FAILED
        }
    }
}

/// Parse `args` as the arguments of `build` (without the subcommand name)
/// and run it.
pub async fn run_from_args(args: &[String]) -> i32 {
    let argv = std::iter::once("build".to_string()).chain(args.iter().cloned());
    match BuildArgs::try_parse_from(argv) {
        Ok(args) => run(args).await,
        Err(e) => report_parse_error(e),
    }
}

/// Cancel the build on the first Ctrl-C.
fn watch_interrupt(cancel: CancelToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling build");
            cancel.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::EXIT_USAGE;
    use tempfile::TempDir;

    #[test]
    fn test_parse_force_and_template() {
        let args = BuildArgs::try_parse_from(["build", "--force", "vm.json"]).unwrap();
        assert!(args.force);
        assert_eq!(args.template, PathBuf::from("vm.json"));
    }

    #[tokio::test]
    async fn test_run_from_args_missing_template_is_usage_error() {
        assert_eq!(run_from_args(&[]).await, EXIT_USAGE);
    }

    #[tokio::test]
    async fn test_invalid_template_fails_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let template = temp.path().join("vm.json");
        std::fs::write(&template, "{ not json").unwrap();

        let code = run_from_args(&[template.display().to_string()]).await;

        assert_eq!(code, EXIT_BUILD_FAILED);
        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
