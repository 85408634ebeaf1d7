//! cloudconfig-rc - rc.d launcher for the cloud-init config stage
//!
//! Installed as `/usr/local/etc/rc.d/cloudconfig`, invoked by rc(8) with a
//! control verb.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cloudconfig_rc::config::{
    DEFAULT_COMMAND, DEFAULT_OVERRIDE_FILE, DEFAULT_RC_CONF_DIR, DEFAULT_RC_CONF_FILES,
    LauncherConfig,
};
use cloudconfig_rc::process::TokioRunner;
use cloudconfig_rc::rc::{self, RcCommand};
use cloudconfig_rc::{Stage, environment};

#[derive(Parser)]
#[command(name = "cloudconfig-rc")]
#[command(author, version, about = "rc.d launcher for the cloud-init config stage", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Boot stage to launch
    #[arg(long, env = "CLOUDRC_STAGE", default_value = "config")]
    stage: Stage,

    /// Program run on start
    #[arg(long, env = "CLOUDRC_COMMAND", default_value = DEFAULT_COMMAND)]
    command: PathBuf,

    /// Override file sourced before start
    #[arg(long, env = "CLOUDRC_OVERRIDE_FILE", default_value = DEFAULT_OVERRIDE_FILE)]
    override_file: PathBuf,

    /// rc.conf files, later files win
    #[arg(
        long = "rc-conf",
        env = "CLOUDRC_RC_CONF",
        value_delimiter = ':',
        default_values = DEFAULT_RC_CONF_FILES
    )]
    rc_conf: Vec<PathBuf>,

    /// Directory of per-service rc.conf files
    #[arg(long, env = "CLOUDRC_RC_CONF_DIR", default_value = DEFAULT_RC_CONF_DIR)]
    rc_conf_dir: PathBuf,

    /// Control verb, e.g. start, stop, onestart, status
    verb: Option<String>,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // stdout belongs to rc output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let parsed = match cli.verb.as_deref() {
        Some(verb) => verb.parse::<RcCommand>(),
        None => Err("no verb given".to_string()),
    };

    let command = match parsed {
        Ok(command) => command,
        Err(e) => {
            debug!("{}", e);
            let program = std::env::args()
                .next()
                .unwrap_or_else(|| "cloudconfig-rc".to_string());
            eprintln!("{}", rc::usage(&program));
            return ExitCode::FAILURE;
        }
    };

    let config = LauncherConfig::for_stage(cli.stage)
        .with_command(&cli.command)
        .with_override_file(&cli.override_file)
        .with_rc_conf_files(&cli.rc_conf)
        .with_rc_conf_dir(&cli.rc_conf_dir);

    let inherited = environment::inherited();

    match rc::run(&config, command, &inherited, &TokioRunner).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            error!("{}", e);
            exit_code(e.exit_code())
        }
    }
}
