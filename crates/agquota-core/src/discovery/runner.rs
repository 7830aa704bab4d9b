use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::DiscoveryError;

/// Runs a shell command line and returns its stdout
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the platform shell, giving up after `timeout`.
    ///
    /// A non-zero exit with empty stdout is an error; a non-zero exit that
    /// still printed something (e.g. the first half of `a || b`) is not.
    fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, DiscoveryError>> + Send;
}

/// [`CommandRunner`] backed by `sh -c` / `cmd /C`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    // cmd.exe does its own quote parsing; pass the line through untouched
    cmd.arg("/C").raw_arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> Result<String, DiscoveryError> {
        debug!(command, "Running discovery command");

        let mut cmd = shell_command(command);
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| DiscoveryError::CommandTimedOut {
                command: command.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| DiscoveryError::CommandFailed {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DiscoveryError::CommandFailed {
                command: command.to_string(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(stdout)
    }
}
