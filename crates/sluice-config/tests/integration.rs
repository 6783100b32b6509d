//! File round-trips for sluice-config.

use sluice_config::{ConfigError, FileOp, SluiceConfig, ValidationError};
use tempfile::TempDir;

#[test]
fn save_then_load_preserves_everything() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = SluiceConfig::default();
    config.server.port = 20_000;
    config.server.bind = "::1".into();
    config.scheduler.weighting = 0.25;
    config.buffers.default_words = 8192;
    config.save(&path).unwrap();

    let loaded = SluiceConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.server_options().unwrap().addr().to_string(), "[::1]:20000");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = SluiceConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, SluiceConfig::default());

    let err = SluiceConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { op: FileOp::Read, .. }));
    assert!(err.is_not_found());
}

#[test]
fn hand_edited_file_is_validated_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scheduler]\nweighting = 2.0\n\n[server]\nsweep_interval_secs = 0\n").unwrap();

    let err = SluiceConfig::load(&path).unwrap_err();
    let ConfigError::Validation(ValidationError::Multiple(errors)) = err else {
        panic!("expected validation errors, got {err}");
    };
    assert_eq!(errors.len(), 2);
}

#[test]
fn saved_file_is_readable_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    SluiceConfig::default().save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[server]"));
    assert!(text.contains("[scheduler]"));
    assert!(text.contains("default_words = 65536"));
}
