//! Error types for cloudconfig-rc

use std::path::PathBuf;
use thiserror::Error;

/// Status a POSIX shell exits with when a sourced file has a syntax error
pub const EXIT_SYNTAX: i32 = 2;

/// Generic failure status
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for cloudconfig-rc operations
#[derive(Error, Debug)]
pub enum RcError {
    #[error("{}: line {line}: {message}", path.display())]
    ShellSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("{0}")]
    Usage(String),

    #[error("Ordering cycle between services: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

impl RcError {
    /// Create a shell syntax error for a file
    pub fn syntax(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::ShellSyntax {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a read error for a file
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Exit status the rc script would have returned for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            // `.` on a broken or unreadable file aborts a non-interactive sh with 2
            Self::ShellSyntax { .. } | Self::Read { .. } => EXIT_SYNTAX,
            Self::Command(_) | Self::Usage(_) | Self::Cycle(_) => EXIT_FAILURE,
        }
    }
}
