//! Subprocess execution for package-manager commands

use std::path::Path;

#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::version::error::CommandError;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Whether the process exited with status 0
    pub success: bool,
    pub stdout: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failed(stdout: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
        }
    }
}

/// Trait for running package-manager commands
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` inside `cwd` and waits for it to exit.
    ///
    /// A non-zero exit status is not an error: listing commands print useful
    /// JSON even when they report problems.
    async fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: Vec<String>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as child processes through tokio
#[derive(Debug, Default)]
pub struct ProcessCommandRunner;

#[async_trait::async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: Vec<String>,
    ) -> Result<CommandOutput, CommandError> {
        debug!("Running `{} {}` in {:?}", program, args.join(" "), cwd);

        let output = tokio::process::Command::new(program)
            .args(&args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
