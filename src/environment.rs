//! Child process environment
//!
//! The environment handed to cloud-init is built as an explicit map and
//! passed to the spawn call; the launcher's own environment is never
//! modified.

use crate::config::ShellVars;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use tracing::{debug, warn};

/// Search path exported to the child
pub const SEARCH_PATH: &str = "/usr/local/bin:/usr/local/sbin:/usr/bin:/usr/sbin";

/// Variable naming the effective cloud-init configuration file
pub const CLOUD_CFG_VAR: &str = "CLOUD_CFG";

/// cloud-init configuration file on FreeBSD
pub const CLOUD_CFG: &str = "/usr/local/etc/cloud/cloud.cfg";

/// Snapshot of the current process environment.
///
/// Entries that are not valid UTF-8 cannot be expanded or overridden and
/// are left out; [`non_utf8_entries`] hands them to the child unchanged.
pub fn inherited() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
            (Ok(k), Ok(v)) => Some((k, v)),
            (k, _) => {
                debug!(
                    "Inherited variable {} is not UTF-8, passing it through",
                    k.map_or_else(|k| k.to_string_lossy().into_owned(), |k| k)
                );
                None
            }
        })
        .collect()
}

/// Entries of `entries` that are not valid UTF-8 and that `env` neither
/// sets nor removes
pub fn non_utf8_entries<I>(env: &LaunchEnv, entries: I) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    entries
        .into_iter()
        .filter(|(k, v)| match k.to_str() {
            None => true,
            Some(name) => v.to_str().is_none() && !env.contains(name) && !env.is_removed(name),
        })
        .collect()
}

/// Environment for one stage invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    vars: BTreeMap<String, String>,
    /// Names the override file unset
    removed: BTreeSet<String>,
}

impl LaunchEnv {
    /// Start from the inherited environment with the fixed search path and
    /// config file set
    pub fn new(inherited: &BTreeMap<String, String>) -> Self {
        let mut vars = inherited.clone();
        vars.insert("PATH".to_string(), SEARCH_PATH.to_string());
        vars.insert(CLOUD_CFG_VAR.to_string(), CLOUD_CFG.to_string());
        Self {
            vars,
            removed: BTreeSet::new(),
        }
    }

    /// Apply override file assignments the way sourcing them would.
    ///
    /// Exported assignments and assignments to names already in the
    /// environment reach the child; other assignments stay shell-local.
    /// Unset names are removed. `CLOUD_CFG` always keeps its fixed value.
    pub fn apply_overrides(&mut self, overrides: &ShellVars) {
        for name in overrides.unset_names() {
            debug!("Override unsets {name}");
            self.vars.remove(name);
            self.removed.insert(name.to_string());
        }

        for var in overrides.iter() {
            if !var.exported && !self.vars.contains_key(&var.name) {
                debug!("Override {} is not exported, skipping", var.name);
                continue;
            }
            debug!("Override {}={}", var.name, var.value);
            self.removed.remove(&var.name);
            self.vars.insert(var.name.clone(), var.value.clone());
        }

        if self.get(CLOUD_CFG_VAR) != Some(CLOUD_CFG) {
            warn!(
                "Ignoring override of {}; using {}",
                CLOUD_CFG_VAR, CLOUD_CFG
            );
            self.vars
                .insert(CLOUD_CFG_VAR.to_string(), CLOUD_CFG.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Whether overrides unset `name`
    pub fn is_removed(&self, name: &str) -> bool {
        self.removed.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}
