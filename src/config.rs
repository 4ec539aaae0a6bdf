//! `solpattern.toml` configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "solpattern.toml";

/// What to do with a file whose pragma is outside the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompatiblePolicy {
    /// Record `IncompatibleVersion` as the file's error; do not analyze.
    #[default]
    Skip,
    /// Analyze anyway and record a warning.
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionsConfig {
    pub supported: String,
    pub on_incompatible: IncompatiblePolicy,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self { supported: ">=0.4.0 <0.9.0".to_string(), on_incompatible: IncompatiblePolicy::Skip }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Worker threads, 0 = all cores.
    pub jobs: usize,
    pub extensions: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { jobs: 0, extensions: vec!["sol".to_string()] }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub versions: VersionsConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In {}", path.display()))
    }

    /// An explicit path must exist; without one, `solpattern.toml` in the
    /// working directory is used when present, else the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let config = Config::from_toml(indoc! {r#"
            [versions]
            on_incompatible = "warn"

            [output]
            format = "csv"
        "#})
        .unwrap();
        assert_eq!(config.versions.on_incompatible, IncompatiblePolicy::Warn);
        assert_eq!(config.versions.supported, ">=0.4.0 <0.9.0");
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::from_toml("[analysis]\nthreads = 4\n").is_err());
    }
}
