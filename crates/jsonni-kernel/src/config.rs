//! Configuration for jsonni.
//!
//! Defaults are loaded from `~/.config/jsonni/config.toml` when present.
//! Command-line flags override anything set here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::format::DataFormat;
use crate::interpreter::Limits;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// JSON indentation; escape sequences such as `\t` are decoded.
    #[serde(default = "default_indent")]
    pub indent: String,

    /// Strip insignificant whitespace from JSON output.
    #[serde(default)]
    pub minify: bool,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Evaluator step and depth budgets.
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub format: DataFormat,

    /// Delimiter for csv/tsv input; the format's default when unset.
    pub delimiter: Option<String>,

    /// Column names for header-less csv/tsv input.
    pub header: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: DataFormat,

    pub delimiter: Option<String>,

    /// Column list for csv/tsv output.
    pub fields: Option<Vec<String>>,
}

fn default_indent() -> String {
    "  ".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            minify: false,
            input: InputConfig::default(),
            output: OutputConfig::default(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::config_path() else {
            tracing::debug!("no config directory, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Default config file path, if the platform has a config directory.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "jsonni").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.indent, "  ");
        assert!(!config.minify);
        assert_eq!(config.input.format, DataFormat::Json);
        assert_eq!(config.output.format, DataFormat::Json);
        assert_eq!(config.limits.max_steps, 10_000_000);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
indent = "\t"
minify = true

[input]
format = "csv"
delimiter = ";"
header = ["id", "name"]

[output]
format = "tsv"
fields = ["name"]

[limits]
max_steps = 5000
max_depth = 32
"#;

        let config: Config = toml::from_str(toml).expect("should parse");
        assert_eq!(config.indent, "\t");
        assert!(config.minify);
        assert_eq!(config.input.format, DataFormat::Csv);
        assert_eq!(config.input.delimiter.as_deref(), Some(";"));
        assert_eq!(config.input.header.as_ref().map(Vec::len), Some(2));
        assert_eq!(config.output.format, DataFormat::Tsv);
        assert_eq!(config.output.fields, Some(vec!["name".to_string()]));
        assert_eq!(config.limits.max_steps, 5000);
        assert_eq!(config.limits.max_depth, 32);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").expect("should parse");
        assert_eq!(config.indent, "  ");
        assert_eq!(config.limits.max_depth, 256);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[input]\nformat = \"xml\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "minify = true\n").expect("write");
        let config = Config::load_from(&path).expect("load");
        assert!(config.minify);
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
