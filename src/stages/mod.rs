//! Boot stage service descriptors
//!
//! cloud-init boots in four rc.d services, ordered by rcorder(8):
//! 1. cloudinitlocal - before network (`init -l`)
//! 2. cloudinit - after network is up (`init`)
//! 3. cloudconfig - configuration modules (`modules --mode config`)
//! 4. cloudfinal - final modules (`modules --mode final`)

pub mod order;

pub use order::boot_order;

use crate::Stage;
use crate::config::DEFAULT_COMMAND;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Enable variable shared by every cloud-init stage
pub const RCVAR: &str = "cloudinit_enable";

/// Value the enable variable takes when nothing sets it
pub const RCVAR_DEFAULT: &str = "NO";

/// Static description of an rc.d service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Name the service provides
    pub name: &'static str,
    /// Enable variable consulted by the dispatcher
    pub rcvar: &'static str,
    /// Services that must start first
    pub require: &'static [&'static str],
    /// Services that must start after this one
    pub before: &'static [&'static str],
    /// Program invoked on start
    pub command: PathBuf,
    /// Fixed arguments passed to the program
    pub args: &'static [&'static str],
}

impl ServiceDescriptor {
    /// Point the descriptor at a different program
    pub fn with_command(mut self, command: impl AsRef<Path>) -> Self {
        self.command = command.as_ref().to_path_buf();
        self
    }

    /// Full command line, program first
    pub fn command_line(&self) -> String {
        let mut line = self.command.display().to_string();
        for arg in self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// rcorder(8) header block
    pub fn header(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# PROVIDE: {}", self.name);
        if !self.require.is_empty() {
            let _ = writeln!(out, "# REQUIRE: {}", self.require.join(" "));
        }
        if !self.before.is_empty() {
            let _ = writeln!(out, "# BEFORE: {}", self.before.join(" "));
        }
        out
    }
}

impl Stage {
    /// rc.d service name of this stage
    pub fn rc_name(&self) -> &'static str {
        match self {
            Stage::Local => "cloudinitlocal",
            Stage::Network => "cloudinit",
            Stage::Config => "cloudconfig",
            Stage::Final => "cloudfinal",
        }
    }

    /// Default descriptor for this stage
    pub fn descriptor(&self) -> ServiceDescriptor {
        match self {
            Stage::Local => descriptor(
                self.rc_name(),
                &["ldconfig", "mountcritlocal"],
                &["NETWORKING", "cloudinit", "cloudconfig", "cloudfinal"],
                &["init", "-l"],
            ),
            Stage::Network => descriptor(
                self.rc_name(),
                &["FILESYSTEMS", "NETWORKING", "cloudinitlocal", "ldconfig", "devd"],
                &["cloudconfig", "cloudfinal"],
                &["init"],
            ),
            Stage::Config => descriptor(
                self.rc_name(),
                &["cloudinit", "cloudinitlocal"],
                &["cloudfinal"],
                &["modules", "--mode", "config"],
            ),
            Stage::Final => descriptor(
                self.rc_name(),
                &["LOGIN", "cloudinit", "cloudconfig", "cloudinitlocal"],
                &[],
                &["modules", "--mode", "final"],
            ),
        }
    }
}

fn descriptor(
    name: &'static str,
    require: &'static [&'static str],
    before: &'static [&'static str],
    args: &'static [&'static str],
) -> ServiceDescriptor {
    ServiceDescriptor {
        name,
        rcvar: RCVAR,
        require,
        before,
        command: PathBuf::from(DEFAULT_COMMAND),
        args,
    }
}
