//! Config file loading, layering and error-message tests.

use assert_fs::prelude::*;
use predicates::prelude::*;
use skillsync_core::{config::config_path_at, Config, ConfigError};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_yields_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = Config::load_at(home.path(), no_env).expect("load");
    assert_eq!(config.skill_provider_name, "Topcoder");
    assert_eq!(config.sleep_time_ms, 1000);
}

#[test]
fn file_values_are_read() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str("SLEEP_TIME: 250\nSKILL_PROVIDER_NAME: EMSI\nAUTH0_CLIENT_ID: abc\n")
        .expect("write");

    let config = Config::load_at(home.path(), no_env).expect("load");
    assert_eq!(config.sleep_time_ms, 250);
    assert_eq!(config.skill_provider_name, "EMSI");
    assert_eq!(config.auth.client_id.as_deref(), Some("abc"));
}

#[test]
fn environment_wins_over_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str("SLEEP_TIME: 250\n")
        .expect("write");

    let config = Config::load_at(home.path(), |key| {
        (key == "SLEEP_TIME").then(|| "10".to_string())
    })
    .expect("load");
    assert_eq!(config.sleep_time_ms, 10);
}

#[test]
fn blank_environment_value_falls_through_to_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str("SLEEP_TIME: 250\nSKILL_PROVIDER_NAME: EMSI\n")
        .expect("write");

    let config = Config::load_at(home.path(), |key| match key {
        "SLEEP_TIME" => Some(String::new()),
        "SKILL_PROVIDER_NAME" => Some("   ".to_string()),
        _ => None,
    })
    .expect("load");
    assert_eq!(config.sleep_time_ms, 250);
    assert_eq!(config.skill_provider_name, "EMSI");
}

#[test]
fn empty_file_is_accepted() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str("")
        .expect("write");
    Config::load_at(home.path(), no_env).expect("load");
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = Config::load_at(home.path(), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "got: {err}");
}

#[test]
fn nested_value_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str("SLEEP_TIME:\n  - 1\n  - 2\n")
        .expect("write");

    let err = Config::load_at(home.path(), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "got: {err}");
    assert!(err.to_string().contains("SLEEP_TIME"));
}

#[test]
fn invalid_number_in_file_is_reported() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".skillsync/config.yaml")
        .write_str("REQUEST_TIMEOUT_MS: later\n")
        .expect("write");

    let err = Config::load_at(home.path(), no_env).unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { key: "REQUEST_TIMEOUT_MS", .. }),
        "got: {err}"
    );
}

#[test]
fn config_path_lives_under_dot_skillsync() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config_path_at(home.path());
    assert!(predicate::str::ends_with("config.yaml").eval(&path.display().to_string()));
    assert!(path.starts_with(home.path().join(".skillsync")));
}
