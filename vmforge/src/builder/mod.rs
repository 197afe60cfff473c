//! Libvirt image builder.
//!
//! ## Architecture
//!
//! Steps run in a fixed order; later steps depend on what earlier ones leave
//! behind:
//!
//! ```text
//!   1. PrepareOutputDir   (create output dir, lxc: extract rootfs archive)
//!   2. CreateDisk         (kvm: qemu-img create inside output dir)
//!   3. CreateNetwork      (virsh net-create NAT network)
//! ```
//!
//! On Halt or cancellation, cleanup runs in reverse: the network is destroyed
//! before the output directory (and the disk inside it) is removed.

pub mod network;
mod steps;

pub use steps::{CreateDiskStep, CreateNetworkStep, PrepareOutputDirStep};

use crate::config::{BuildConfig, DomainType};
use crate::pipeline::{BoxedStep, BuildState, PipelineExecutor, PipelineOutcome};
use crate::ui::BuildUi;
use crate::util::{CancelToken, CommandRunner};
use std::path::PathBuf;
use std::sync::Arc;
use vmforge_shared::errors::{VmforgeError, VmforgeResult};

/// Ordered provisioning steps.
pub fn build_steps() -> Vec<BoxedStep> {
    vec![
        Box::new(PrepareOutputDirStep),
        Box::new(CreateDiskStep),
        Box::new(CreateNetworkStep),
    ]
}

/// What a successful build leaves behind for the hypervisor tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub vm_name: String,
    pub domain_type: DomainType,
    pub output_dir: PathBuf,
    /// Disk image, present for kvm domains.
    pub disk_path: Option<PathBuf>,
}

/// Runs the provisioning pipeline for one build configuration.
///
/// # Example
///
/// ```ignore
/// let artifact = LibvirtBuilder::new(config)
///     .run(Arc::new(ConsoleUi::new("libvirt")), Arc::new(ProcessRunner), cancel)
///     .await?;
/// ```
pub struct LibvirtBuilder {
    config: BuildConfig,
}

impl LibvirtBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Sanitize the configuration, run every step, and unwind on failure.
    ///
    /// Returns the error recorded by the halting step, or
    /// [`VmforgeError::Cancelled`] if the build was interrupted.
    pub async fn run(
        self,
        ui: Arc<dyn BuildUi>,
        runner: Arc<dyn CommandRunner>,
        cancel: CancelToken,
    ) -> VmforgeResult<Artifact> {
        let mut config = self.config;
        config.sanitize()?;

        let iso_path = config.iso_path.clone();
        let mut state = BuildState::new(Arc::new(config), ui, runner, cancel);
        if let Some(iso_path) = iso_path {
            state.set_iso_path(iso_path);
        }

        let steps = build_steps();
        let report = PipelineExecutor::execute(&steps, &mut state).await;

        match report.outcome {
            PipelineOutcome::Completed => {
                let config = state.config();
                Ok(Artifact {
                    vm_name: config.vm_name.clone(),
                    domain_type: config.domain_type,
                    output_dir: config.output_dir.clone(),
                    disk_path: state.disk_path().map(PathBuf::from),
                })
            }
            PipelineOutcome::Halted => Err(state.take_error().unwrap_or_else(|| {
                VmforgeError::Internal("build halted without recording an error".into())
            })),
            PipelineOutcome::Cancelled => Err(VmforgeError::Cancelled),
        }
    }
}
