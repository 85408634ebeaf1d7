//! Launcher configuration
//!
//! Paths the launcher reads and the rc configuration the enable flag comes
//! from. Defaults match a FreeBSD cloud-init install.

pub mod loader;
pub mod shvars;

pub use loader::{load_overrides, load_rc_config};
pub use shvars::{ShellVar, ShellVars, SkippedStatement, SyntaxError};

use crate::Stage;
use crate::stages::ServiceDescriptor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// cloud-init entry point
pub const DEFAULT_COMMAND: &str = "/usr/local/bin/cloud-init";

/// Operator override file sourced before the stage starts
pub const DEFAULT_OVERRIDE_FILE: &str = "/etc/defaults/cloud-init";

/// System rc.conf files, in load order
pub const DEFAULT_RC_CONF_FILES: [&str; 2] = ["/etc/rc.conf", "/etc/rc.conf.local"];

/// Per-service rc.conf directory
pub const DEFAULT_RC_CONF_DIR: &str = "/etc/rc.conf.d";

/// Launcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Boot stage this launcher runs
    pub stage: Stage,
    /// Program invoked on start
    pub command: PathBuf,
    /// Optional override file
    pub override_file: PathBuf,
    /// rc.conf files, later files win
    pub rc_conf_files: Vec<PathBuf>,
    /// Directory holding `<service name>` rc.conf fragments
    pub rc_conf_dir: PathBuf,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LauncherConfig {
    /// Config stage with default paths
    pub fn new() -> Self {
        Self::for_stage(Stage::Config)
    }

    /// Default paths for any stage
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            stage,
            command: PathBuf::from(DEFAULT_COMMAND),
            override_file: PathBuf::from(DEFAULT_OVERRIDE_FILE),
            rc_conf_files: DEFAULT_RC_CONF_FILES.iter().map(PathBuf::from).collect(),
            rc_conf_dir: PathBuf::from(DEFAULT_RC_CONF_DIR),
        }
    }

    /// Use a different program (useful for testing)
    pub fn with_command(mut self, command: impl AsRef<Path>) -> Self {
        self.command = command.as_ref().to_path_buf();
        self
    }

    /// Use a different override file
    pub fn with_override_file(mut self, path: impl AsRef<Path>) -> Self {
        self.override_file = path.as_ref().to_path_buf();
        self
    }

    /// Replace the rc.conf file list
    pub fn with_rc_conf_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.rc_conf_files = files.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Use a different rc.conf.d directory
    pub fn with_rc_conf_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.rc_conf_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Descriptor for the configured stage, pointing at the configured program
    pub fn descriptor(&self) -> ServiceDescriptor {
        self.stage.descriptor().with_command(&self.command)
    }

    /// Every rc configuration file consulted, in load order
    ///
    /// /etc/rc.conf, /etc/rc.conf.local, then /etc/rc.conf.d/<name>
    pub fn rc_conf_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.rc_conf_files.clone();
        paths.push(self.rc_conf_dir.join(self.stage.rc_name()));
        paths
    }
}

/// Variables visible to the service manager when it decides whether a
/// service is enabled
#[derive(Debug, Clone, Default)]
pub struct RcConfig {
    vars: ShellVars,
    inherited: BTreeMap<String, String>,
}

impl RcConfig {
    pub fn new(vars: ShellVars, inherited: BTreeMap<String, String>) -> Self {
        Self { vars, inherited }
    }

    /// rc.conf assignment, falling back to the inherited environment
    /// unless rc.conf unset the name
    pub fn value(&self, name: &str) -> Option<&str> {
        if self.vars.is_unset(name) {
            return None;
        }
        self.vars
            .get(name)
            .or_else(|| self.inherited.get(name).map(String::as_str))
    }

    /// Variables assigned by rc.conf files
    pub fn vars(&self) -> &ShellVars {
        &self.vars
    }
}
