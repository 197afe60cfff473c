//! External tool invocation with combined output capture.

use super::cancel::CancelToken;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use vmforge_shared::errors::{VmforgeError, VmforgeResult};

/// A single external tool invocation: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Arguments as lossy UTF-8 strings, for logging and assertions.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a finished tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Stdout and stderr interleaved in arrival order.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into [`VmforgeError::Tool`] carrying the combined output.
    pub fn check(self, cmd: &ToolCommand) -> VmforgeResult<CommandOutput> {
        if self.success() {
            return Ok(self);
        }
        let status = match self.code {
            Some(code) => format!("exit status {}", code),
            None => "signal".to_string(),
        };
        Err(VmforgeError::Tool {
            program: cmd.program.clone(),
            status,
            output: self.output.trim().to_string(),
        })
    }
}

/// Runs external tools.
///
/// The seam between provisioning steps and the host: steps only ever talk to
/// hypervisor tools through this trait, never through `Command` directly.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion.
    ///
    /// When `cancel` is given and fires before the tool exits, the child is
    /// killed and [`VmforgeError::Cancelled`] is returned. A non-zero exit is
    /// NOT an error here; use [`CommandOutput::check`].
    async fn run(
        &self,
        cmd: &ToolCommand,
        cancel: Option<&CancelToken>,
    ) -> VmforgeResult<CommandOutput>;
}

/// [`CommandRunner`] backed by real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        cmd: &ToolCommand,
        cancel: Option<&CancelToken>,
    ) -> VmforgeResult<CommandOutput> {
        tracing::debug!(command = %cmd, "Executing tool");

        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the collection future on cancel must take the child down with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VmforgeError::Spawn {
                program: cmd.program.clone(),
                source: e,
            })?;

        let collected = match cancel {
            Some(token) => {
                tokio::select! {
                    res = collect_combined(child) => res,
                    _ = token.cancelled() => {
                        tracing::warn!(command = %cmd, "Tool interrupted by cancellation");
                        return Err(VmforgeError::Cancelled);
                    }
                }
            }
            None => collect_combined(child).await,
        };

        let (status, output) = collected.map_err(|e| VmforgeError::Spawn {
            program: cmd.program.clone(),
            source: e,
        })?;

        let output = CommandOutput {
            code: status.code(),
            output: String::from_utf8_lossy(&output).into_owned(),
        };
        tracing::debug!(command = %cmd, code = ?output.code, "Tool finished");
        Ok(output)
    }
}

/// Drain stdout and stderr into one buffer, then wait for exit.
async fn collect_combined(mut child: Child) -> std::io::Result<(ExitStatus, Vec<u8>)> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut combined = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf) => match read? {
                0 => stdout = None,
                n => combined.extend_from_slice(&out_buf[..n]),
            },
            read = read_some(&mut stderr, &mut err_buf) => match read? {
                0 => stderr = None,
                n => combined.extend_from_slice(&err_buf[..n]),
            },
        }
    }

    let status = child.wait().await?;
    Ok((status, combined))
}

async fn read_some<R>(reader: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_run_captures_combined_output_and_code() {
        let cmd = sh("echo out; echo err 1>&2; exit 3");
        let output = ProcessRunner.run(&cmd, None).await.unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert!(output.output.contains("out"));
        assert!(output.output.contains("err"));
    }

    #[tokio::test]
    async fn test_check_attaches_output_to_error() {
        let cmd = sh("echo 'Could not create disk' 1>&2; exit 1");
        let err = ProcessRunner
            .run(&cmd, None)
            .await
            .unwrap()
            .check(&cmd)
            .unwrap_err();

        match err {
            VmforgeError::Tool {
                program, output, ..
            } => {
                assert_eq!(program, "sh");
                assert_eq!(output, "Could not create disk");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cmd = ToolCommand::new("/nonexistent/vmforge-test-tool");
        let err = ProcessRunner.run(&cmd, None).await.unwrap_err();
        assert!(matches!(err, VmforgeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_tool() {
        let token = CancelToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let start = Instant::now();
        let err = ProcessRunner
            .run(&sh("sleep 10"), Some(&token))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_display_joins_args() {
        let cmd = ToolCommand::new("qemu-img").args(["create", "-f", "qcow2"]);
        assert_eq!(cmd.to_string(), "qemu-img create -f qcow2");
        assert_eq!(cmd.arg_strings(), vec!["create", "-f", "qcow2"]);
    }
}
