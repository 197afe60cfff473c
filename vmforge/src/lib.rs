//! Libvirt image build pipeline.
//!
//! vmforge prepares the preconditions for a virtual machine image build
//! (output directory, disk image, virtual network) by running an ordered
//! sequence of provisioning steps, and can fetch a build template from a
//! remote git repository before running that same pipeline against it.
//!
//! ## Architecture
//!
//! ```text
//! commands::get ──→ template::GitFetcher ──→ (local template dir)
//!       │
//!       └──→ commands::build ──→ builder::LibvirtBuilder
//!                                     │
//!                                     ▼
//!                      pipeline::PipelineExecutor ──→ BuildStep::run  (in order)
//!                                     │                BuildStep::cleanup (reverse)
//!                                     ▼
//!                              util::CommandRunner (qemu-img, virsh, tar)
//! ```
//!
//! Hypervisor tools are treated as opaque subprocesses. Actual VM execution is
//! delegated to them and is not part of this crate.

pub mod builder;
pub mod commands;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod template;
pub mod ui;
pub mod util;

pub use builder::{Artifact, LibvirtBuilder};
pub use config::{BuildConfig, DomainType};
pub use logging::init_logging;
pub use pipeline::{BuildState, BuildStep, PipelineExecutor, PipelineOutcome, StepAction};
pub use template::{FetchSummary, GitFetcher, RemoteSource};
pub use vmforge_shared::errors::{VmforgeError, VmforgeResult};
