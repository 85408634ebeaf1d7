//! Shell file loader
//!
//! Loads the rc configuration and the override file from disk.

use super::{LauncherConfig, RcConfig, ShellVars};
use crate::RcError;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Load a shell assignment file; a missing file is not an error
pub async fn load_shell_file<F>(
    path: impl AsRef<Path>,
    lookup: F,
) -> Result<Option<ShellVars>, RcError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();

    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not present, skipping", path.display());
            return Ok(None);
        }
        Err(e) => return Err(RcError::read(path, e)),
    };

    let vars = ShellVars::parse_with(&content, lookup)
        .map_err(|e| RcError::syntax(path, e.line, e.message))?;

    for skipped in vars.skipped() {
        warn!(
            "{}: line {}: {}, statement skipped",
            path.display(),
            skipped.line,
            skipped.reason
        );
    }

    debug!("Loaded {} variables from {}", vars.len(), path.display());
    Ok(Some(vars))
}

/// Load rc.conf, rc.conf.local and rc.conf.d/<name>, later files winning
pub async fn load_rc_config(
    config: &LauncherConfig,
    inherited: &BTreeMap<String, String>,
) -> Result<RcConfig, RcError> {
    let mut vars = ShellVars::default();

    for path in config.rc_conf_paths() {
        let loaded = load_shell_file(&path, |name| {
            if vars.is_unset(name) {
                return None;
            }
            vars.get(name)
                .map(str::to_string)
                .or_else(|| inherited.get(name).cloned())
        })
        .await?;

        if let Some(loaded) = loaded {
            vars.extend(loaded);
        }
    }

    Ok(RcConfig::new(vars, inherited.clone()))
}

/// Load the override file, expanding against the environment it will be
/// applied to
pub async fn load_overrides(
    path: impl AsRef<Path>,
    env: &BTreeMap<String, String>,
) -> Result<Option<ShellVars>, RcError> {
    load_shell_file(path, |name| env.get(name).cloned()).await
}
