//! Unit tests for the config module.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::io::Write;

use crate::{
    CyprusError,
    config::{Config, DEFAULT_PORT, LogLevel},
};

#[test]
fn config_default() {
    let config = Config::default();

    assert_eq!(config.server.port, DEFAULT_PORT);
    assert!(config.server.secure);
    assert_eq!(config.server.shutdown_timeout_secs, 10);
    assert_eq!(config.media.add_settle_delay_ms, 500);
    assert_eq!(config.discovery.instance_name, "Cyprus");
    assert_eq!(config.general.log_level, LogLevel::Info);
}

#[test]
fn config_serialize_toml() {
    let config = Config::default();

    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("[general]"));
    assert!(toml_str.contains("[server]"));
    assert!(toml_str.contains("[discovery]"));
    assert!(toml_str.contains("[media]"));
}

#[test]
fn config_partial_sections_keep_defaults() {
    let toml_str = r#"
        [server]
        port = 4000
        secure = false

        [media]
        ignored_players = ["chromium"]
    "#;

    let config = Config::from_toml_str(toml_str).unwrap();

    assert_eq!(config.server.port, 4000);
    assert!(!config.server.secure);
    assert_eq!(config.server.io_timeout_secs, 10);
    assert_eq!(config.media.ignored_players, vec!["chromium".to_string()]);
    assert_eq!(config.media.handshake_timeout_ms, 2000);
}

#[test]
fn config_empty_toml() {
    let config = Config::from_toml_str("").unwrap();

    assert_eq!(config.server.port, DEFAULT_PORT);
    assert!(config.discovery.enabled);
}

#[test]
fn config_rejects_zero_capacity() {
    let err = Config::from_toml_str("[server]\nchannel_capacity = 0\n").unwrap_err();

    match err {
        CyprusError::InvalidConfigField { field, .. } => {
            assert_eq!(field, "server.channel_capacity");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn config_rejects_invalid_toml() {
    let err = Config::from_toml_str("[server\nport = ").unwrap_err();

    assert!(matches!(err, CyprusError::TomlParse { .. }));
}

#[test]
fn log_level_parses_lowercase() {
    let config = Config::from_toml_str("[general]\nlog_level = \"debug\"\n").unwrap();

    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert_eq!(config.general.log_level.to_string(), "debug");
}

#[test]
fn load_missing_file_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let config = Config::load(&path).unwrap();

    assert_eq!(config.server.port, DEFAULT_PORT);
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[discovery]\ninstance_name = \"Living Room\"").unwrap();

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.discovery.instance_name, "Living Room");
    assert_eq!(config.discovery.qualified_service_type(), "_cyprus._tcp.local.");
}

#[test]
fn media_ignore_patterns_match_substrings() {
    let config = Config::from_toml_str("[media]\nignored_players = [\"firefox\", \"\"]\n").unwrap();

    assert!(config.media.is_ignored("org.mpris.MediaPlayer2.firefox.instance_1_42"));
    assert!(!config.media.is_ignored("org.mpris.MediaPlayer2.spotify"));
}
