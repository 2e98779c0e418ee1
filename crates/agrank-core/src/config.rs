//! Configuration management for agrank.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`AGRANK__` prefix, `__` separator)
//! 2. Config file (`agrank.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;

use crate::error::{CoreError, Result};

/// Default config file prefix.
pub const DEFAULT_FILE_PREFIX: &str = "agrank";

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "AGRANK";

/// Load one section of the layered configuration.
///
/// A missing file is not an error. A missing section yields `T::default()`.
/// A present but malformed section is reported, so that a typo in
/// `agrank.toml` does not silently fall back to defaults.
pub fn load_section<T>(file_prefix: &str, env_prefix: &str, section: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| CoreError::Config(e.to_string()))?;

    match cfg.get::<T>(section) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section not found, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(CoreError::Config(format!("[{section}]: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default = "default_level")]
        level: u32,
        #[serde(default)]
        name: String,
    }

    fn default_level() -> u32 {
        3
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                level: default_level(),
                name: String::new(),
            }
        }
    }

    #[test]
    fn missing_file_and_section_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let sample: Sample =
            load_section(prefix.to_str().unwrap(), "AGRANK_TEST_MISSING", "sample").unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn file_section_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrank.toml");
        std::fs::write(&path, "[sample]\nlevel = 7\nname = \"x\"\n").unwrap();

        let prefix = dir.path().join("agrank");
        let sample: Sample =
            load_section(prefix.to_str().unwrap(), "AGRANK_TEST_FILE", "sample").unwrap();
        assert_eq!(sample.level, 7);
        assert_eq!(sample.name, "x");
    }

    #[test]
    fn malformed_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrank.toml");
        std::fs::write(&path, "[sample]\nlevel = \"high\"\n").unwrap();

        let prefix = dir.path().join("agrank");
        let result: Result<Sample> =
            load_section(prefix.to_str().unwrap(), "AGRANK_TEST_BAD", "sample");
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
