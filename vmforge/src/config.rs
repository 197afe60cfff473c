//! Build configuration.
//!
//! Resolved once before the pipeline starts and immutable afterwards. Steps
//! read it through [`crate::pipeline::BuildState::config`].

use crate::util::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use vmforge_shared::errors::{ResultExt, VmforgeError, VmforgeResult};

/// Virtualization mode of the domain being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainType {
    /// Hardware-virtualized guest backed by a disk image.
    #[default]
    Kvm,
    /// Container guest; the output directory is its root filesystem.
    Lxc,
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainType::Kvm => write!(f, "kvm"),
            DomainType::Lxc => write!(f, "lxc"),
        }
    }
}

impl FromStr for DomainType {
    type Err = VmforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kvm" => Ok(DomainType::Kvm),
            "lxc" => Ok(DomainType::Lxc),
            other => Err(VmforgeError::Config(format!(
                "unknown domain type {:?}, expected \"kvm\" or \"lxc\"",
                other
            ))),
        }
    }
}

/// Program names (or paths) of the hypervisor tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub qemu_img: String,
    pub virsh: String,
    pub tar: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            qemu_img: "qemu-img".to_string(),
            virsh: "virsh".to_string(),
            tar: "tar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// VM name, also used as the virtual network name.
    pub vm_name: String,
    /// Empty means `output-<vm_name>`.
    pub output_dir: PathBuf,
    /// Disk file stem. Empty means `<vm_name>`.
    pub disk_name: String,
    /// Disk size in megabytes.
    pub disk_size: u64,
    /// Disk image format passed to `qemu-img create -f`.
    pub disk_type: String,
    pub domain_type: DomainType,
    /// Hypervisor connection URI.
    pub uri: String,
    /// Source image. For lxc domains, a (possibly compressed) rootfs tarball.
    pub iso_path: Option<PathBuf>,
    /// Permit deleting a pre-existing output directory.
    pub force: bool,
    pub tools: ToolPaths,
    pub cleanup_retry: RetryPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            vm_name: "vmforge".to_string(),
            output_dir: PathBuf::new(),
            disk_name: String::new(),
            disk_size: 40000,
            disk_type: "qcow2".to_string(),
            domain_type: DomainType::Kvm,
            uri: "qemu:///system".to_string(),
            iso_path: None,
            force: false,
            tools: ToolPaths::default(),
            cleanup_retry: RetryPolicy::default(),
        }
    }
}

impl BuildConfig {
    /// Load a JSON build template.
    pub fn from_path(path: &Path) -> VmforgeResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Failed to parse template {}", path.display()))
    }

    pub fn from_json(raw: &str) -> VmforgeResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate and fill derived defaults. Call before any side effect.
    pub fn sanitize(&mut self) -> VmforgeResult<()> {
        if self.vm_name.trim().is_empty() {
            return Err(VmforgeError::Config("vm_name must not be empty".into()));
        }

        if self.output_dir.as_os_str().is_empty() {
            self.output_dir = PathBuf::from(format!("output-{}", self.vm_name));
        }

        if self.disk_name.is_empty() {
            self.disk_name = self.vm_name.clone();
        }
        // The disk must live inside the output directory: its cleanup is what
        // reclaims the image on failure.
        if !is_single_component(&self.disk_name) {
            return Err(VmforgeError::Config(format!(
                "disk_name {:?} must be a plain file name",
                self.disk_name
            )));
        }

        match self.domain_type {
            DomainType::Kvm => {
                if self.disk_size == 0 {
                    return Err(VmforgeError::Config("disk_size must be positive".into()));
                }
                if self.disk_type.trim().is_empty() {
                    return Err(VmforgeError::Config("disk_type must not be empty".into()));
                }
            }
            DomainType::Lxc => {
                if self.iso_path.is_none() {
                    return Err(VmforgeError::Config(
                        "iso_path is required for lxc domains".into(),
                    ));
                }
            }
        }

        if self.cleanup_retry.attempts == 0 {
            return Err(VmforgeError::Config(
                "cleanup_retry.attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Path of the disk image inside the output directory.
    pub fn disk_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.img", self.disk_name))
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
