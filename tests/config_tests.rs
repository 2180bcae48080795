// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use paxibox::Config;
use paxibox::capture::FacingMode;
use paxibox::remote::FirebaseConfig;
use paxibox::session::SessionSettings;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.min_code_len, 3);
    assert_eq!(config.settle_delay(), Duration::from_millis(250));
    assert_eq!(config.log_timeout(), Duration::from_millis(10_000));
    assert_eq!(config.health_timeout(), Duration::from_millis(8_000));
    assert_eq!(config.camera.facing, FacingMode::Environment);
    assert!(config.firebase.is_none());
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.min_code_len = 5;
    config.camera.device = Some("/dev/video2".into());
    config.firebase = Some(FirebaseConfig {
        project_id: Some("paxi".into()),
        database_url: Some("https://paxi.firebaseio.com".into()),
        ..Default::default()
    });
    config.save_to(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"databaseURL\""), "Firebase keys keep their web names");

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_session_settings_follow_config() {
    let config = Config {
        min_code_len: 6,
        settle_delay_ms: 1_000,
        ..Default::default()
    };
    let settings = SessionSettings::from(&config);
    assert_eq!(settings.min_code_len, 6);
    assert_eq!(settings.settle_delay, Duration::from_secs(1));
    assert_eq!(settings.log_timeout, config.log_timeout());
}
