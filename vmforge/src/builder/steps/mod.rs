//! Provisioning steps of the libvirt builder.

mod create_disk;
mod create_network;
mod prepare_output_dir;

pub use create_disk::CreateDiskStep;
pub use create_network::CreateNetworkStep;
pub use prepare_output_dir::PrepareOutputDirStep;
