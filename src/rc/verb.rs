//! Control verbs and their prefixes

use std::fmt;
use std::str::FromStr;

/// Action requested of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Status,
    Rcvar,
    Enabled,
    Describe,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::Start,
        Verb::Stop,
        Verb::Restart,
        Verb::Status,
        Verb::Rcvar,
        Verb::Enabled,
        Verb::Describe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Status => "status",
            Verb::Rcvar => "rcvar",
            Verb::Enabled => "enabled",
            Verb::Describe => "describe",
        }
    }

    /// Whether the enable variable must be set for this verb to run
    pub fn is_gated(&self) -> bool {
        matches!(self, Verb::Start | Verb::Restart | Verb::Status)
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modifier in front of a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// Skip running-state checks
    Fast,
    /// Ignore the enable variable and failures of pre-commands
    Force,
    /// Ignore the enable variable
    One,
    /// Suppress the "Cannot ..." notice for disabled services
    Quiet,
}

impl Prefix {
    pub const ALL: [Prefix; 4] = [Prefix::Fast, Prefix::Force, Prefix::One, Prefix::Quiet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Fast => "fast",
            Prefix::Force => "force",
            Prefix::One => "one",
            Prefix::Quiet => "quiet",
        }
    }
}

/// A parsed control argument such as `start` or `onestart`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcCommand {
    pub prefix: Option<Prefix>,
    pub verb: Verb,
}

impl RcCommand {
    pub fn new(verb: Verb) -> Self {
        Self { prefix: None, verb }
    }

    pub fn with_prefix(verb: Verb, prefix: Prefix) -> Self {
        Self {
            prefix: Some(prefix),
            verb,
        }
    }

    /// `one` and `force` run a disabled service anyway
    pub fn bypasses_enable(&self) -> bool {
        matches!(self.prefix, Some(Prefix::One | Prefix::Force))
    }

    pub fn is_quiet(&self) -> bool {
        self.prefix == Some(Prefix::Quiet)
    }

    /// Whether rc.conf has to be read before dispatching
    pub fn needs_rc_config(&self) -> bool {
        match self.verb {
            Verb::Rcvar | Verb::Enabled => true,
            verb => verb.is_gated() && !self.bypasses_enable(),
        }
    }
}

impl FromStr for RcCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(verb) = Verb::from_name(s) {
            return Ok(Self::new(verb));
        }

        for prefix in Prefix::ALL {
            if let Some(verb) = s.strip_prefix(prefix.as_str()).and_then(Verb::from_name) {
                return Ok(Self::with_prefix(verb, prefix));
            }
        }

        Err(format!("unknown command '{s}'"))
    }
}

impl fmt::Display for RcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.prefix {
            f.write_str(prefix.as_str())?;
        }
        f.write_str(self.verb.as_str())
    }
}

/// rc.subr-style usage line
pub fn usage(program: &str) -> String {
    let prefixes: Vec<_> = Prefix::ALL.iter().map(Prefix::as_str).collect();
    let verbs: Vec<_> = Verb::ALL.iter().map(Verb::as_str).collect();
    format!(
        "Usage: {program} [{}]({})",
        prefixes.join("|"),
        verbs.join("|")
    )
}
