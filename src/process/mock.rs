//! Mock command runner for testing
//!
//! Records every invocation and answers with configured results.

use super::{CommandOutput, CommandRunner, Invocation};
use crate::RcError;
use async_trait::async_trait;
use std::sync::Mutex;

/// Mock runner for testing dispatch without spawning processes
#[derive(Debug, Default)]
pub struct MockRunner {
    exit_code: i32,
    run_error: Option<String>,
    probe_output: CommandOutput,
    invocations: Mutex<Vec<Invocation>>,
    probes: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockRunner {
    /// Runner whose commands succeed and whose probes find nothing
    pub fn new() -> Self {
        Self {
            probe_output: CommandOutput {
                code: 1,
                stdout: String::new(),
            },
            ..Default::default()
        }
    }

    /// Exit code returned by `run`
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Make `run` fail to spawn
    pub fn with_run_error(mut self, error: &str) -> Self {
        self.run_error = Some(error.to_string());
        self
    }

    /// Output returned by `output`
    pub fn with_probe_output(mut self, code: i32, stdout: &str) -> Self {
        self.probe_output = CommandOutput {
            code,
            stdout: stdout.to_string(),
        };
        self
    }

    /// Invocations passed to `run`, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Commands passed to `output`, in order
    pub fn probes(&self) -> Vec<(String, Vec<String>)> {
        self.probes.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<i32, RcError> {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(invocation.clone());
        }

        if let Some(error) = &self.run_error {
            return Err(RcError::Command(error.clone()));
        }

        Ok(self.exit_code)
    }

    async fn output(&self, program: &str, args: &[String]) -> Result<CommandOutput, RcError> {
        if let Ok(mut probes) = self.probes.lock() {
            probes.push((program.to_string(), args.to_vec()));
        }

        Ok(self.probe_output.clone())
    }
}
