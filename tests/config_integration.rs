use career_mentor::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;
use std::time::Duration;

const ARGS: [&str; 1] = ["career-mentor"];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for key in [
            "CONFIG_FILE",
            "HOST",
            "PORT",
            "CHAT_API_URL",
            "FREE_INTERACTIONS_LIMIT",
            "AUTH_JWT_SECRET",
            "LOG_JSON",
            "CAREER_MENTOR_SERVER__PORT",
            "CAREER_MENTOR_CHAT__BASE_URL",
            "CAREER_MENTOR_USAGE__FREE_LIMIT",
        ] {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(ARGS).expect("defaults should load");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.chat.base_url, "http://localhost:8000");
    assert_eq!(config.usage.free_limit, 25);
    assert_eq!(config.popup_delay(), Duration::from_secs(2));
    assert!(config.auth.jwt_secret.is_none());

    let settings = config.controller_settings();
    assert_eq!(settings.free_limit, 25);
    assert_eq!(settings.playback.min_delay, Duration::from_millis(50));
    assert_eq!(settings.playback.max_delay, Duration::from_millis(150));
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("CAREER_MENTOR_SERVER__PORT", "9090");
        env::set_var("CAREER_MENTOR_CHAT__BASE_URL", "http://chat.internal:8000");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.chat.base_url, "http://chat.internal:8000");

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("CAREER_MENTOR_SERVER__PORT", "9090");
        env::set_var("FREE_INTERACTIONS_LIMIT", "3");
    }

    let config = AppConfig::load_from_args(["career-mentor", "--port", "4000"])
        .expect("Failed to load config");
    assert_eq!(config.server.port, 4000);
    assert_eq!(config.usage.free_limit, 3);
    assert_eq!(config.bind_address(), "0.0.0.0:4000");

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("tempdir");
    let file_path = dir.path().join("mentor.yaml");
    fs::write(
        &file_path,
        r#"
server:
  port: 7070
usage:
  free_limit: 10
streaming:
  min_delay_ms: 0
  max_delay_ms: 0
"#,
    )
    .expect("Failed to write temp config");

    unsafe {
        env::set_var("CONFIG_FILE", &file_path);
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.usage.free_limit, 10);
    assert_eq!(config.controller_settings().playback.max_delay, Duration::ZERO);

    clear_env_vars();
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    clear_env_vars();

    let zero = AppConfig::load_from_args(["career-mentor", "--free-limit", "0"]);
    assert!(zero.is_err());

    let bad_url = AppConfig::load_from_args(["career-mentor", "--chat-url", "not a url"]);
    assert!(bad_url.is_err());

    let dir = tempfile::tempdir().expect("tempdir");
    let file_path = dir.path().join("inverted.yaml");
    fs::write(
        &file_path,
        "streaming:\n  min_delay_ms: 200\n  max_delay_ms: 100\n",
    )
    .expect("Failed to write temp config");
    let inverted = AppConfig::load_from_args([
        "career-mentor",
        "--config",
        file_path.to_str().expect("utf-8 path"),
    ]);
    assert!(inverted.is_err());
}
