//! Host-side utilities: process invocation, cancellation, filesystem helpers.

mod cancel;
pub mod fs;
mod process;

pub use cancel::CancelToken;
pub use fs::RetryPolicy;
pub use process::{CommandOutput, CommandRunner, ProcessRunner, ToolCommand};
