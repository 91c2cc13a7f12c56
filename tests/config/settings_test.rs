//! Loading settings from disk.

use std::fs;
use std::path::PathBuf;

use meerkat::config::{Settings, SettingsError};

fn write_config(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meerkat-settings-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_from_file() {
    let path = write_config(
        "full.toml",
        r#"
[compile]
use_dot_notation = true

[engine]
timeout_ms = 2500
"#,
    );

    let settings = Settings::from_file(&path).unwrap();
    assert!(settings.compile.use_dot_notation);
    assert_eq!(settings.engine.timeout_ms, 2500);

    let options = settings.compile_options();
    assert!(options.use_dot_notation);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let path = write_config("partial.toml", "[compile]\nuse_dot_notation = true\n");
    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.engine.timeout_ms, 30_000);
}

#[test]
fn test_invalid_toml() {
    let path = write_config("broken.toml", "[engine\ntimeout_ms = ");
    assert!(matches!(
        Settings::from_file(&path),
        Err(SettingsError::ParseError(_))
    ));
}

#[test]
fn test_missing_env_var_in_file() {
    let path = write_config(
        "env.toml",
        "[engine]\ntimeout_ms = ${MEERKAT_SETTINGS_TEST_UNSET_VAR}\n",
    );
    assert!(matches!(
        Settings::from_file(&path),
        Err(SettingsError::MissingEnvVar(name)) if name == "MEERKAT_SETTINGS_TEST_UNSET_VAR"
    ));
}
