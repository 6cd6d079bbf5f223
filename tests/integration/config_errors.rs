// tests/integration/config_errors.rs

use std::io::Write;
use std::path::PathBuf;

use choreshift::config::loader::apply_env_overrides;
use choreshift::config::{ConfigFile, RawConfigFile, load_and_validate, load_or_default};
use choreshift::errors::ChoreError;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_yields_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine().lookback_days, 100);
    assert_eq!(cfg.engine().qualification_tolerance_hours, 6);
    assert_eq!(cfg.store().data_dir, PathBuf::from("./databases"));
    assert_eq!(cfg.store().file_prefix, "database-");
    assert_eq!(cfg.engine_options().lookback_days, 100);
    assert_eq!(cfg.engine_options().max_points_per_task, 3);
}

#[test]
fn sections_override_defaults() {
    let file = write_config(
        r#"
[engine]
lookback_days = 30
group_by_recurrence = true
max_points_per_task = 5

[store]
data_dir = "/var/lib/choreshift"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine().lookback_days, 30);
    assert_eq!(cfg.engine().qualification_tolerance_hours, 6);
    assert!(cfg.engine().group_by_recurrence);
    assert_eq!(cfg.engine_options().max_points_per_task, 5);
    assert_eq!(cfg.store().data_dir, PathBuf::from("/var/lib/choreshift"));
}

#[test]
fn zero_lookback_returns_config_error() {
    let file = write_config("[engine]\nlookback_days = 0\n");

    match load_and_validate(file.path()) {
        Err(ChoreError::ConfigError(msg)) => assert!(msg.contains("lookback_days")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn day_long_tolerance_returns_config_error() {
    let file = write_config("[engine]\nqualification_tolerance_hours = 24\n");

    match load_and_validate(file.path()) {
        Err(ChoreError::ConfigError(msg)) => {
            assert!(msg.contains("qualification_tolerance_hours"));
            assert!(msg.contains("24"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn empty_data_dir_returns_config_error() {
    let file = write_config("[store]\ndata_dir = \"\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ChoreError::ConfigError(_))
    ));
}

#[test]
fn unknown_keys_and_bad_types_are_toml_errors() {
    for contents in [
        "[engine]\nlookback = 5\n",
        "[engine]\nlookback_days = \"ten\"\n",
        "[store]\nfile_prefix = 3\n",
    ] {
        let file = write_config(contents);
        match load_and_validate(file.path()) {
            Err(ChoreError::TomlError(_)) => {}
            other => panic!("Expected TomlError for {contents:?}, got: {other:?}"),
        }
    }
}

#[test]
fn missing_file_is_an_io_error_unless_defaults_are_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Choreshift.toml");

    assert!(matches!(
        load_and_validate(&path),
        Err(ChoreError::IoError(_))
    ));
    assert_eq!(
        load_or_default(&path).unwrap().store(),
        ConfigFile::default().store()
    );
}

#[test]
fn grouping_env_var_forces_grouping_on() {
    let base = ConfigFile::try_from(RawConfigFile::default()).unwrap();
    assert!(!base.engine().group_by_recurrence);

    let forced = apply_env_overrides(base.clone(), |key| {
        (key == "ENABLE_REPETITION_GROUPING").then(|| "TRUE".to_string())
    });
    assert!(forced.engine().group_by_recurrence);

    let untouched = apply_env_overrides(base, |_| Some("no".to_string()));
    assert!(!untouched.engine().group_by_recurrence);
}
