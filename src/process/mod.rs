//! External command execution
//!
//! All child processes go through [`CommandRunner`] so the dispatcher can be
//! exercised without spawning cloud-init.

pub mod mock;

use crate::RcError;
use crate::environment::{self, LaunchEnv};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::ExitStatus;
use tracing::{debug, warn};

/// Shell status for a command that cannot be found
pub const EXIT_NOT_FOUND: i32 = 127;

/// Shell status for a command that exists but cannot be executed
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// One stage invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Environment of the child; inherited entries that are not UTF-8 are
    /// added at spawn time
    pub env: LaunchEnv,
}

/// Captured output of a probe command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run with inherited stdio and wait; returns the shell-style exit code
    async fn run(&self, invocation: &Invocation) -> Result<i32, RcError>;

    /// Run with the launcher's environment and capture stdout
    async fn output(&self, program: &str, args: &[String]) -> Result<CommandOutput, RcError>;
}

/// Runner backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, invocation: &Invocation) -> Result<i32, RcError> {
        debug!(
            "Running {} {:?}",
            invocation.program.display(),
            invocation.args
        );

        let status = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .env_clear()
            .envs(invocation.env.iter())
            .envs(environment::non_utf8_entries(
                &invocation.env,
                std::env::vars_os(),
            ))
            .status()
            .await;

        match status {
            Ok(status) => Ok(exit_code(status)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{}: not found", invocation.program.display());
                Ok(EXIT_NOT_FOUND)
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!("{}: permission denied", invocation.program.display());
                Ok(EXIT_NOT_EXECUTABLE)
            }
            Err(e) => Err(RcError::Command(format!(
                "{}: {}",
                invocation.program.display(),
                e
            ))),
        }
    }

    async fn output(&self, program: &str, args: &[String]) -> Result<CommandOutput, RcError> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| RcError::Command(format!("{program}: {e}")))?;

        Ok(CommandOutput {
            code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Exit code a shell would report for `status`: the code itself, or
/// 128 + signal number when the child was killed
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
