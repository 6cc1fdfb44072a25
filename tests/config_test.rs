//! Configuration loading tests against files on disk

use serial_test::serial;
use smslog_receiver::config::{CollisionPolicy, Config, ConfigError, LogFormat};
use std::path::PathBuf;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
#[serial]
fn test_load_full_config_with_env_expansion() {
    std::env::set_var("SMSLOG_TEST_BASE", "/srv/smslog");
    let (_dir, path) = write_config(
        r#"
server:
  address: "127.0.0.1:8081"
  upload_path: "/bobcripps/fileupload.php"
upload:
  field_name: smslog
  max_file_size: 2048
  temp_dir: /tmp
storage:
  base_dir: "${SMSLOG_TEST_BASE}/SMS_FILE"
  collision: unique
  error_template: "${SMSLOG_TEST_TEMPLATE:-errorResponse.xml}"
metrics:
  enabled: false
logging:
  format: pretty
"#,
    );

    let config = Config::load(&path).unwrap();
    std::env::remove_var("SMSLOG_TEST_BASE");

    assert_eq!(config.server.upload_path, "/bobcripps/fileupload.php");
    assert_eq!(config.upload.max_file_size, 2048);
    assert_eq!(config.upload.spool_dir(), PathBuf::from("/tmp"));
    assert_eq!(
        config.storage.base_dir,
        PathBuf::from("/srv/smslog/SMS_FILE")
    );
    assert_eq!(config.storage.collision, CollisionPolicy::Unique);
    assert_eq!(
        config.storage.error_template,
        Some(PathBuf::from("errorResponse.xml"))
    );
    assert!(!config.metrics.enabled);
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_load_rejects_invalid_values() {
    let (_dir, path) = write_config("upload:\n  max_file_size: 0\n");
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_load_rejects_unknown_collision_policy() {
    let (_dir, path) = write_config("storage:\n  collision: rename\n");
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}
