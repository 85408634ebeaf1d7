//! Tests for loading operator override files into the child environment

use cloudconfig_rc::config::{LauncherConfig, load_overrides, load_rc_config};
use cloudconfig_rc::environment::{CLOUD_CFG, LaunchEnv};
use cloudconfig_rc::launcher::Launcher;
use cloudconfig_rc::process::mock::MockRunner;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

/// Typical /etc/defaults/cloud-init written by an operator
const OVERRIDES: &str = r#"# Local cloud-init tweaks
export http_proxy="http://proxy.internal:3128"
export https_proxy=$http_proxy
no_proxy='169.254.169.254,localhost'
export no_proxy

# Not exported: stays local to the rc script
RETRIES=3
"#;

fn inherited() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("HOME".to_string(), "/".to_string()),
        ("PATH".to_string(), "/sbin:/bin".to_string()),
    ])
}

#[tokio::test]
async fn test_operator_overrides_reach_child() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cloud-init");
    fs::write(&path, OVERRIDES).unwrap();

    let mut env = LaunchEnv::new(&inherited());
    let overrides = load_overrides(&path, env.as_map()).await.unwrap().unwrap();
    env.apply_overrides(&overrides);

    assert_eq!(env.get("http_proxy"), Some("http://proxy.internal:3128"));
    assert_eq!(env.get("https_proxy"), Some("http://proxy.internal:3128"));
    assert_eq!(env.get("no_proxy"), Some("169.254.169.254,localhost"));
    assert!(!env.contains("RETRIES"));
    assert_eq!(env.get("CLOUD_CFG"), Some(CLOUD_CFG));
    assert_eq!(env.get("HOME"), Some("/"));
}

#[tokio::test]
async fn test_missing_override_file_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    let env = LaunchEnv::new(&inherited());

    let loaded = load_overrides(temp.path().join("absent"), env.as_map())
        .await
        .unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_launcher_uses_override_file() {
    let temp = TempDir::new().unwrap();
    let config = LauncherConfig::new().with_override_file(temp.path().join("cloud-init"));
    fs::write(&config.override_file, OVERRIDES).unwrap();

    let inherited = inherited();
    let runner = MockRunner::new();
    let code = Launcher::new(&config, &inherited, &runner)
        .start()
        .await
        .unwrap();

    assert_eq!(code, 0);
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(
        invocations[0].env.get("https_proxy"),
        Some("http://proxy.internal:3128")
    );
    assert_eq!(invocations[0].args, vec!["modules", "--mode", "config"]);
}

#[tokio::test]
async fn test_shell_commands_in_override_file_skipped() {
    let temp = TempDir::new().unwrap();
    let config = LauncherConfig::new().with_override_file(temp.path().join("cloud-init"));
    fs::write(&config.override_file, "export A=1\nlogger cloud-init starting\n").unwrap();

    let inherited = inherited();
    let runner = MockRunner::new();
    let code = Launcher::new(&config, &inherited, &runner)
        .start()
        .await
        .unwrap();

    assert_eq!(code, 0);
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].env.get("A"), Some("1"));
}

#[tokio::test]
async fn test_enable_default_in_override_file_still_starts() {
    let temp = TempDir::new().unwrap();
    let config = LauncherConfig::new().with_override_file(temp.path().join("cloud-init"));
    fs::write(
        &config.override_file,
        "cloudinit_enable=${cloudinit_enable:-NO}\nexport CI_DEBUG=${CI_DEBUG:-1}\n",
    )
    .unwrap();

    let inherited = inherited();
    let runner = MockRunner::new();
    let code = Launcher::new(&config, &inherited, &runner)
        .start()
        .await
        .unwrap();

    assert_eq!(code, 0);
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].env.get("CI_DEBUG"), Some("1"));
    assert!(!invocations[0].env.contains("cloudinit_enable"));
}

#[tokio::test]
async fn test_unset_in_override_file_removes_variable() {
    let temp = TempDir::new().unwrap();
    let config = LauncherConfig::new().with_override_file(temp.path().join("cloud-init"));
    fs::write(&config.override_file, "unset http_proxy HOME\n").unwrap();

    let mut inherited = inherited();
    inherited.insert("http_proxy".to_string(), "http://proxy:3128".to_string());
    let runner = MockRunner::new();
    let code = Launcher::new(&config, &inherited, &runner)
        .start()
        .await
        .unwrap();

    assert_eq!(code, 0);
    let invocations = runner.invocations();
    let env = &invocations[0].env;
    assert!(!env.contains("http_proxy"));
    assert!(!env.contains("HOME"));
    assert_eq!(env.get("CLOUD_CFG"), Some(CLOUD_CFG));
}

#[tokio::test]
async fn test_unterminated_quote_in_override_file_is_fatal() {
    let temp = TempDir::new().unwrap();
    let config = LauncherConfig::new().with_override_file(temp.path().join("cloud-init"));
    fs::write(&config.override_file, "export A=1\nlogger 'cloud-init starting\n").unwrap();

    let inherited = inherited();
    let runner = MockRunner::new();
    let err = Launcher::new(&config, &inherited, &runner)
        .start()
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("line 2"));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn test_rc_conf_enable_not_read_from_override_file() {
    let temp = TempDir::new().unwrap();
    let config = LauncherConfig::new()
        .with_override_file(temp.path().join("cloud-init"))
        .with_rc_conf_files([temp.path().join("rc.conf")])
        .with_rc_conf_dir(temp.path().join("rc.conf.d"));
    fs::write(temp.path().join("rc.conf"), "cloudinit_enable=\"YES\"\n").unwrap();
    fs::write(&config.override_file, "cloudinit_enable=\"NO\"\n").unwrap();

    let rc = load_rc_config(&config, &BTreeMap::new()).await.unwrap();
    assert_eq!(rc.value("cloudinit_enable"), Some("YES"));
}
