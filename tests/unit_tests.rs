use clap::Parser;
use squeal_sync::{ErrorPolicy, RuntimeConfig, RuntimeOpts, SourceOpts, TargetOpts};
use std::time::Duration;

#[test]
fn test_source_opts_creation() {
    let opts = SourceOpts::parse_from([
        "test",
        "--source-host",
        "mongo",
        "--source-database",
        "test_db",
        "--source-username",
        "test",
        "--source-password",
        "password",
    ]);

    assert_eq!(opts.source_host, "mongo");
    assert_eq!(opts.source_port, 27017);
    let config = opts.config().unwrap();
    assert_eq!(config.database, "test_db");
    assert_eq!(config.username, Some("test".to_string()));
    assert_eq!(config.password, Some("password".to_string()));
}

#[test]
fn test_source_opts_without_database() {
    let opts = SourceOpts::parse_from(["test"]);
    assert!(opts.config().is_none());
}

#[test]
fn test_target_opts_creation() {
    let opts = TargetOpts::parse_from([
        "test",
        "--adapter",
        "mariadb",
        "--target-port",
        "3307",
        "--target-database",
        "app",
    ]);

    assert_eq!(opts.target_user, "root");
    assert_eq!(opts.target_password, "");
    let config = opts.config().unwrap().unwrap();
    assert_eq!(config.adapter, "mariadb");
    assert_eq!(config.port, Some(3307));
}

#[test]
fn test_runtime_opts_parse_durations() {
    let opts = RuntimeOpts::parse_from([
        "test",
        "--cursor-timeout",
        "500ms",
        "--write-timeout",
        "2m",
        "--error-policy",
        "skip",
        "--dry-run",
    ]);

    let mut runtime = RuntimeConfig::default();
    opts.apply(&mut runtime);
    assert_eq!(runtime.cursor_timeout, Some(Duration::from_millis(500)));
    assert_eq!(runtime.write_timeout, Some(Duration::from_secs(120)));
    assert_eq!(runtime.error_policy, ErrorPolicy::Skip);
    assert!(runtime.dry_run);
    assert_eq!(runtime.connect_timeout, Duration::from_secs(10));
}

#[test]
fn test_runtime_opts_reject_bad_duration() {
    assert!(RuntimeOpts::try_parse_from(["test", "--write-timeout", "soon"]).is_err());
}
