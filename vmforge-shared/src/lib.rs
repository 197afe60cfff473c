//! Types shared between vmforge crates.

pub mod errors;

pub use errors::{ResultExt, VmforgeError, VmforgeResult};
