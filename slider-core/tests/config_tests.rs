//! Config error-message, atomic-write-safety, and init integration tests.
//! Layout: ~/.slider/config.yaml

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use slider_core::{
    config::{self, CONFIG_TEMPLATE},
    ConfigError, CourseSelector, DestinationConfig,
};
use std::fs;

fn write_config(home: &assert_fs::TempDir, body: &str) {
    home.child(".slider/config.yaml").write_str(body).expect("write config");
}

const VALID: &str = r#"
version: 1
source:
  root_url: https://portal.example.org/api/tree
  username: jdoe
courses:
  - Course
  - pattern: Stat
    folder: Statistics
destination:
  kind: local
  path: /srv/uni
"#;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_mentions_init() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("slider init"));
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, ": : corrupt : yaml : !!!\n  - broken: [unclosed");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[rstest]
#[case::empty_root_url("https://portal.example.org/api/tree", "''")]
#[case::bad_pattern("- Course", "- '(unclosed'")]
fn load_rejects_invalid_values(#[case] from: &str, #[case] to: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, &VALID.replacen(from, to, 1));
    let err = config::load_at(home.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid(_) | ConfigError::InvalidPattern { .. }),
        "got: {err}"
    );
}

#[test]
fn load_valid_config_applies_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, VALID);

    let cfg = config::load_at(home.path()).expect("load");
    assert_eq!(cfg.courses.len(), 2);
    assert_eq!(cfg.courses[1], CourseSelector::Aliased {
        pattern: "Stat".to_string(),
        folder: Some("Statistics".to_string()),
    });
    assert!(matches!(cfg.destination, DestinationConfig::Local { .. }));
    assert_eq!(cfg.sync.passthrough_label, "Files");
    assert_eq!(cfg.source.timeout_secs, 180);
    assert!(!cfg.sync.log_all);

    let matcher = cfg.course_matcher().expect("matcher");
    assert_eq!(matcher.select("Statistik II"), Some("Statistics"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, VALID);
    let cfg = config::load_at(home.path()).expect("load");
    config::save_at(home.path(), &cfg).expect("save");

    let path = config::config_path_at(home.path());
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_file_name("config.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    let current_bytes = fs::read(&path).expect("read after crash");
    assert_eq!(original_bytes, current_bytes, "original must be unchanged after crash");
    config::load_at(home.path()).expect("config still loads");
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_template() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::init_at(home.path(), false).expect("init");

    home.child(".slider/config.yaml").assert(predicate::path::exists());
    assert_eq!(fs::read_to_string(&path).expect("read"), CONFIG_TEMPLATE);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn init_refuses_to_clobber_without_force() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, VALID);

    let err = config::init_at(home.path(), false).unwrap_err();
    assert!(matches!(err, ConfigError::AlreadyExists { .. }), "got: {err}");
    home.child(".slider/config.yaml")
        .assert(predicate::str::contains("jdoe"));

    config::init_at(home.path(), true).expect("forced init");
    home.child(".slider/config.yaml")
        .assert(predicate::str::contains("auth_failure_marker"));
}
