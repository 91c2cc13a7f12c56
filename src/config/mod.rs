//! Configuration for meerkat.
//!
//! Settings come from a TOML file with environment variable expansion.

mod settings;

pub use settings::{expand_env_vars, CompileSettings, EngineSettings, Settings, SettingsError};
