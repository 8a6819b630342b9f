//! # Application Configuration
//!
//! Loads the campaign configuration from a YAML file and environment variables.
//! Values in the file may reference environment variables as `${VAR}`; they are
//! substituted before parsing so credentials can stay out of the file.

use anyhow::{bail, Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use kbload::UploaderConfig;
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

/// The configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "kbload.yml";

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Za-z0-9_]+)\}")?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.into_owned()))
}

/// Loads the configuration in layers:
///
/// 1. The YAML file at `path_override`, or `kbload.yml` in the working directory.
///    An explicitly given file must exist; the default one is optional.
/// 2. `KBLOAD_`-prefixed environment variables, with `__` separating nested keys
///    (e.g. `KBLOAD_RETRY__MAX_FAILURES=3`).
///
/// Missing optional settings fall back to the defaults declared on `UploaderConfig`.
pub fn get_config(path_override: Option<&Path>) -> Result<UploaderConfig> {
    let mut builder = ConfigBuilder::builder();

    let path = path_override.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match read_and_substitute(path)? {
        Some(content) => {
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if path_override.is_some() => {
            bail!("Config file not found at '{}'", path.display());
        }
        None => {}
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("KBLOAD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: UploaderConfig = settings
        .try_deserialize()
        .context("Invalid kbload configuration")?;
    Ok(config)
}
