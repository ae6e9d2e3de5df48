use serial_test::serial;
use std::env;
use std::fs;
use tutor_bridge::Mode;
use tutor_bridge::client::{ClearRoute, EndpointKind};
use tutor_bridge::config::AppConfig;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("TUTOR_CONFIG_FILE");
        env::remove_var("TUTOR_BACKEND_URL");
        env::remove_var("TUTOR_STATE_FILE");
        env::remove_var("TUTOR_BACKEND__BASE_URL");
        env::remove_var("TUTOR_SESSION__DEFAULT_MODE");
        env::remove_var("TUTOR_REQUEST_LOG__CAPACITY");
        env::remove_var("TUTOR_HISTORY__CLEAR_ROUTE");
    }
}

fn load(extra: &[&str]) -> AppConfig {
    let mut args = vec!["tutor-bridge"];
    args.extend_from_slice(extra);
    AppConfig::load_from_args(args).expect("Failed to load config")
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load(&[]);
    assert_eq!(config.backend.base_url, "http://127.0.0.1:8000");
    assert_eq!(config.backend.timeout_secs, 60);
    assert_eq!(config.routes.tutor.primary, EndpointKind::Query);
    assert_eq!(config.routes.tutor.fallback, Some(EndpointKind::TutorChat));
    assert_eq!(config.routes.debugger.primary, EndpointKind::DebuggerChat);
    assert_eq!(config.session.default_mode, Mode::Tutor);
    assert!(!config.session.rotate_on_clear);
    assert!(config.history.enabled);
    assert_eq!(config.history.clear_route, ClearRoute::Delete);
    assert_eq!(config.request_log.capacity, 50);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("TUTOR_BACKEND__BASE_URL", "http://tutor.internal:9000");
        env::set_var("TUTOR_SESSION__DEFAULT_MODE", "debugger");
        env::set_var("TUTOR_REQUEST_LOG__CAPACITY", "5");
        env::set_var("TUTOR_HISTORY__CLEAR_ROUTE", "post_clear");
    }

    let config = load(&[]);
    assert_eq!(config.backend.base_url, "http://tutor.internal:9000");
    assert_eq!(config.session.default_mode, Mode::Debugger);
    assert_eq!(config.request_log.capacity, 5);
    assert_eq!(config.history.clear_route, ClearRoute::PostClear);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("TUTOR_BACKEND__BASE_URL", "http://from-env:1");
    }

    let config = load(&["--base-url", "http://from-cli:2", "--no-history"]);
    assert_eq!(config.backend.base_url, "http://from-cli:2");
    assert!(!config.history.enabled);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("custom.yaml");
    let config_content = r#"
backend:
  base_url: http://file-host:7070
routes:
  tutor:
    primary: tutor_legacy
session:
  rotate_on_clear: true
    "#;
    fs::write(&file_path, config_content).expect("Failed to write temp config");

    // Tell AppConfig to use this file via Env Var (read by clap)
    unsafe {
        env::set_var("TUTOR_CONFIG_FILE", &file_path);
    }

    let config = load(&[]);
    assert_eq!(config.backend.base_url, "http://file-host:7070");
    assert_eq!(config.routes.tutor.primary, EndpointKind::TutorLegacy);
    assert!(config.session.rotate_on_clear);
    // Untouched keys keep their defaults
    assert_eq!(config.routes.debugger.primary, EndpointKind::DebuggerChat);

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["tutor-bridge", "--config", "/nonexistent/tutor.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let original = env::current_dir().expect("cwd");
    fs::write(
        dir.path().join("tutor.yaml"),
        "backend:\n  base_url: http://cwd-host:6060\n",
    )
    .expect("Failed to write ./tutor.yaml");
    env::set_current_dir(dir.path()).expect("chdir");

    // Should pick up ./tutor.yaml
    let config = AppConfig::load_from_args(["tutor-bridge"]);

    env::set_current_dir(original).expect("restore cwd");
    assert_eq!(config.unwrap().backend.base_url, "http://cwd-host:6060");
}

#[tokio::test]
#[serial]
async fn test_session_persists_through_state_file() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state_file = dir.path().join("nested").join("state.json");
    let state_arg = state_file.to_string_lossy().into_owned();
    let config = load(&["--state-file", &state_arg, "--no-history"]);

    let first = config.tutor_session().unwrap();
    assert!(!first.history_enabled());
    let id = first.ensure_session().await.unwrap().id;
    assert!(state_file.exists());

    let reopened = config.tutor_session().unwrap();
    assert_eq!(reopened.ensure_session().await.unwrap().id, id);
}

#[tokio::test]
#[serial]
async fn test_history_worker_follows_config() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state_arg = dir.path().join("state.json").to_string_lossy().into_owned();
    let config = load(&["--state-file", &state_arg]);

    assert!(config.tutor_session().unwrap().history_enabled());
}
