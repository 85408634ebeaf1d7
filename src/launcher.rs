//! Boot-stage launcher
//!
//! Start sources the override file, prints a progress line and runs the
//! stage command once, returning its exit code unchanged. Stop does
//! nothing: the stage runs to completion during start.

use crate::RcError;
use crate::config::{LauncherConfig, load_overrides};
use crate::environment::LaunchEnv;
use crate::process::{CommandRunner, Invocation};
use crate::stages::ServiceDescriptor;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Launcher for one boot stage
pub struct Launcher<'a> {
    config: &'a LauncherConfig,
    descriptor: ServiceDescriptor,
    inherited: &'a BTreeMap<String, String>,
    runner: &'a dyn CommandRunner,
}

impl<'a> Launcher<'a> {
    pub fn new(
        config: &'a LauncherConfig,
        inherited: &'a BTreeMap<String, String>,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            descriptor: config.descriptor(),
            inherited,
            runner,
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Build the invocation, loading overrides if the file exists
    pub async fn prepare(&self) -> Result<Invocation, RcError> {
        let mut env = LaunchEnv::new(self.inherited);

        match load_overrides(&self.config.override_file, env.as_map()).await? {
            Some(overrides) => {
                info!(
                    "Applying {} overrides from {}",
                    overrides.len(),
                    self.config.override_file.display()
                );
                env.apply_overrides(&overrides);
            }
            None => debug!("No override file at {}", self.config.override_file.display()),
        }

        Ok(Invocation {
            program: self.descriptor.command.clone(),
            args: self.descriptor.args.iter().map(|a| a.to_string()).collect(),
            env,
        })
    }

    /// Run the stage; the result is the command's own exit code
    pub async fn start(&self) -> Result<i32, RcError> {
        let invocation = self.prepare().await?;

        println!("{} starting", self.descriptor.command.display());
        info!("Starting {}: {}", self.descriptor.name, self.descriptor.command_line());

        let code = self.runner.run(&invocation).await?;
        if code == 0 {
            info!("{} completed", self.descriptor.name);
        } else {
            warn!("{} exited with status {}", self.descriptor.name, code);
        }
        Ok(code)
    }

    /// Nothing to stop
    pub fn stop(&self) -> i32 {
        debug!("{}: stop is a no-op", self.descriptor.name);
        0
    }
}
