//! rc.d command dispatch
//!
//! Routes a control verb such as `start` or `onestatus` to its handler,
//! applying the enable-flag gate the way rc.subr(8) does.

pub mod verb;

pub use verb::{Prefix, RcCommand, Verb, usage};

use crate::RcError;
use crate::config::{LauncherConfig, RcConfig, load_rc_config};
use crate::launcher::Launcher;
use crate::process::CommandRunner;
use crate::stages::{RCVAR_DEFAULT, ServiceDescriptor};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Interpret an rc.conf boolean: `Some(true)` for YES/TRUE/ON/1,
/// `Some(false)` for NO/FALSE/OFF/0, `None` for anything else
pub fn checkyesno(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Load whatever the command needs and dispatch it
pub async fn run(
    config: &LauncherConfig,
    command: RcCommand,
    inherited: &BTreeMap<String, String>,
    runner: &dyn CommandRunner,
) -> Result<i32, RcError> {
    let rc_conf = if command.needs_rc_config() {
        load_rc_config(config, inherited).await?
    } else {
        RcConfig::new(Default::default(), inherited.clone())
    };

    RcDispatcher::new(config, &rc_conf, inherited, runner)
        .dispatch(command)
        .await
}

/// Verb dispatcher for one service
pub struct RcDispatcher<'a> {
    rc_conf: &'a RcConfig,
    launcher: Launcher<'a>,
    runner: &'a dyn CommandRunner,
}

impl<'a> RcDispatcher<'a> {
    pub fn new(
        config: &'a LauncherConfig,
        rc_conf: &'a RcConfig,
        inherited: &'a BTreeMap<String, String>,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            rc_conf,
            launcher: Launcher::new(config, inherited, runner),
            runner,
        }
    }

    fn descriptor(&self) -> &ServiceDescriptor {
        self.launcher.descriptor()
    }

    /// Current value of the enable variable
    pub fn rcvar_value(&self) -> &str {
        self.rc_conf
            .value(self.descriptor().rcvar)
            .unwrap_or(RCVAR_DEFAULT)
    }

    /// Whether the enable variable allows the service to run
    pub fn is_enabled(&self) -> bool {
        let value = self.rcvar_value();
        checkyesno(value).unwrap_or_else(|| {
            warn!(
                "${} is not set properly - see rc.conf(5).",
                self.descriptor().rcvar
            );
            false
        })
    }

    /// Run the handler for `command`, returning the exit code
    pub async fn dispatch(&self, command: RcCommand) -> Result<i32, RcError> {
        debug!("Dispatching {} for {}", command, self.descriptor().name);

        if command.verb.is_gated() && !command.bypasses_enable() && !self.is_enabled() {
            if !command.is_quiet() {
                let verb = command.verb.as_str();
                println!(
                    "Cannot '{verb}' {}. Set {} to YES in /etc/rc.conf or use 'one{verb}' instead of '{verb}'.",
                    self.descriptor().name,
                    self.descriptor().rcvar
                );
            }
            return Ok(0);
        }

        match command.verb {
            Verb::Start => self.launcher.start().await,
            Verb::Stop => Ok(self.launcher.stop()),
            Verb::Restart => self.restart().await,
            Verb::Status => self.status().await,
            Verb::Rcvar => Ok(self.rcvar()),
            Verb::Enabled => Ok(if self.is_enabled() { 0 } else { 1 }),
            Verb::Describe => Ok(self.describe()),
        }
    }

    async fn restart(&self) -> Result<i32, RcError> {
        self.launcher.stop();
        self.launcher.start().await
    }

    /// Look for a running stage command with pgrep(1)
    async fn status(&self) -> Result<i32, RcError> {
        let name = self.descriptor().name;
        let pattern = self.descriptor().command_line();
        let output = self
            .runner
            .output("pgrep", &["-f".to_string(), pattern])
            .await?;

        let pids: Vec<&str> = output.stdout.split_whitespace().collect();
        if output.code == 0 && !pids.is_empty() {
            println!("{name} is running as pid {}.", pids.join(" "));
            Ok(0)
        } else {
            println!("{name} is not running.");
            Ok(1)
        }
    }

    fn rcvar(&self) -> i32 {
        let descriptor = self.descriptor();
        println!("# {}", descriptor.name);
        println!("#");
        println!("{}=\"{}\"", descriptor.rcvar, self.rcvar_value());
        println!("#   (default: \"{RCVAR_DEFAULT}\")");
        0
    }

    fn describe(&self) -> i32 {
        print!("{}", self.descriptor().header());
        println!("# COMMAND: {}", self.descriptor().command_line());
        0
    }
}
