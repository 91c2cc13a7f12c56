//! TOML-based configuration for meerkat.
//!
//! Supports a config file (meerkat.toml) with `${VAR}` expansion applied to
//! the raw text before parsing.
//!
//! Example configuration:
//! ```toml
//! [compile]
//! use_dot_notation = true
//!
//! [engine]
//! timeout_ms = ${MEERKAT_TIMEOUT_MS}
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::compile::CompileOptions;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Compiler output settings.
    pub compile: CompileSettings,

    /// Execution engine settings.
    pub engine: EngineSettings,
}

/// Compiler output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Name output columns `"table.member"` instead of `table__member`.
    pub use_dot_notation: bool,
}

/// Execution engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Parse settings from TOML text, expanding environment variables first.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_vars(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        log::debug!("loading settings from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `MEERKAT_CONFIG`
    /// 2. `./meerkat.toml`
    /// 3. `<config dir>/meerkat/config.toml`
    ///
    /// Falls back to defaults when none exists.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("MEERKAT_CONFIG") {
            return Self::from_file(path);
        }

        let local_config = PathBuf::from("meerkat.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("meerkat").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::trace!("no config file found, using defaults");
        Ok(Settings::default())
    }

    /// Compile options derived from the `[compile]` section.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::default().with_dot_notation(self.compile.use_dot_notation)
    }
}

/// Expand `${VAR}` references from the process environment.
///
/// A `$` not followed by a well-formed `${NAME}` is left as is.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut last = 0;

    for caps in ENV_VAR_RE.captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = env::var(name.as_str())
            .map_err(|_| SettingsError::MissingEnvVar(name.as_str().to_string()))?;
        result.push_str(&s[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }

    result.push_str(&s[last..]);
    Ok(result)
}
