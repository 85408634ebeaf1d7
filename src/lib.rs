//! cloudconfig-rc library
//!
//! rc.d launcher for the cloud-init boot stages on FreeBSD.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Explicit environment**: the child environment is a value, never
//!   ambient mutation of the launcher's own
//! - **Transparent failures**: the stage command's exit code is returned
//!   unchanged

pub mod config;
pub mod environment;
pub mod launcher;
pub mod process;
pub mod rc;
pub mod stages;

mod error;

pub use error::RcError;

use std::str::FromStr;

/// cloud-init boot stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Local stage - runs before network is available
    Local,
    /// Network stage - runs after network is configured
    Network,
    /// Config stage - runs configuration modules
    Config,
    /// Final stage - runs final modules and user scripts
    Final,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Local => write!(f, "local"),
            Stage::Network => write!(f, "network"),
            Stage::Config => write!(f, "config"),
            Stage::Final => write!(f, "final"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    /// Accepts stage names (`config`) and rc.d service names (`cloudconfig`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Stage::Local, Stage::Network, Stage::Config, Stage::Final]
            .into_iter()
            .find(|stage| s == stage.to_string() || s == stage.rc_name())
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}
