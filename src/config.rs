//! Configuration loading.
//!
//! The harness reads its defaults from `kensa.toml`:
//!
//! ```toml
//! logging = true
//! strict_keys = false
//! ignored_headers = ["date", "content-length"]
//! ```
//!
//! Loading order:
//!
//! 1. If the `KENSA_CONFIG` environment variable is set, load from that path
//! 2. Otherwise, load from `kensa.toml` in the current directory
//!
//! A missing file yields the defaults. After the file, `KENSA_LOGGING`,
//! `KENSA_STRICT_KEYS` and `KENSA_IGNORED_HEADERS` (comma-separated)
//! environment variables override individual values.
//!
//! **Note:** `KENSA_CONFIG` is reserved for the config file path. If kensa
//! detects misuse (e.g. `KENSA_CONFIG=true`), it errors with a helpful
//! message.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{io::Read, path::Path};
use tracing::*;

use crate::{Error, Result};

/// Environment variable name for specifying the config file path.
const KENSA_CONFIG_ENV: &str = "KENSA_CONFIG";

static CONFIG: Lazy<Config> = Lazy::new(|| {
    let _ = dotenv::dotenv();
    Config::load().unwrap_or_default()
});

/// Get the process-wide configuration, loaded once on first access.
pub fn get_config() -> &'static Config {
    &CONFIG
}

/// Harness configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Whether HTTP exchanges and per-check outcomes are published to the
    /// event channel. Logging never affects assertion outcomes.
    #[serde(default = "default_logging")]
    pub logging: bool,
    /// Default key-presence mode; a test case may override it.
    #[serde(default)]
    pub strict_keys: bool,
    /// Header names exempt from the header check, unioned with each case's
    /// own ignore-list.
    #[serde(default)]
    pub ignored_headers: Vec<String>,
}

fn default_logging() -> bool {
    true
}

impl Default for Config {
    fn default() -> Config {
        Config {
            logging: true,
            strict_keys: false,
            ignored_headers: Vec::new(),
        }
    }
}

impl Config {
    /// Load kensa configuration from path.
    fn load_from(path: &Path) -> Result<Config> {
        let Ok(mut file) = std::fs::File::open(path) else {
            return Ok(Config::default());
        };

        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .map_err(|e| Error::LoadError(e.to_string()))?;

        let mut cfg: Config = toml::from_str(&buf).map_err(|e| {
            Error::LoadError(format!(
                "failed to deserialize kensa.toml into kensa::Config: {e}"
            ))
        })?;

        debug!("kensa.toml was successfully loaded: {cfg:#?}");

        cfg.load_env();

        Ok(cfg)
    }

    /// Load kensa configuration.
    ///
    /// Loading order:
    /// 1. If `KENSA_CONFIG` env var is set, load from that path
    /// 2. Otherwise, load from `kensa.toml` in the current directory
    fn load() -> Result<Config> {
        match std::env::var(KENSA_CONFIG_ENV) {
            Ok(path) => {
                let path = Path::new(&path);

                // Detect misuse: if it doesn't look like a file path, error out
                if path.extension().is_none_or(|ext| ext != "toml")
                    && !path.to_string_lossy().contains(std::path::MAIN_SEPARATOR)
                    && !path.to_string_lossy().contains('/')
                {
                    return Err(Error::LoadError(format!(
                        "{KENSA_CONFIG_ENV} should be a path to a config file, not a config value. \
                         Got: {path:?}. Use KENSA_<KEY>=value for config values instead.",
                    )));
                }

                if !path.exists() {
                    return Err(Error::LoadError(format!(
                        "Config file specified by {KENSA_CONFIG_ENV} not found: {path:?}",
                    )));
                }

                debug!("Loading config from {KENSA_CONFIG_ENV}={path:?}");
                Config::load_from(path)
            }
            Err(_) => Config::load_from(Path::new("kensa.toml")),
        }
    }

    /// Override individual values from `KENSA_*` environment variables.
    fn load_env(&mut self) {
        if let Ok(value) = std::env::var("KENSA_LOGGING") {
            match value.parse() {
                Ok(logging) => self.logging = logging,
                Err(_) => error!("KENSA_LOGGING must be true or false, got {value:?}"),
            }
        }
        if let Ok(value) = std::env::var("KENSA_STRICT_KEYS") {
            match value.parse() {
                Ok(strict) => self.strict_keys = strict,
                Err(_) => error!("KENSA_STRICT_KEYS must be true or false, got {value:?}"),
            }
        }
        if let Ok(value) = std::env::var("KENSA_IGNORED_HEADERS") {
            self.ignored_headers = value
                .split(',')
                .map(|header| header.trim().to_string())
                .filter(|header| !header.is_empty())
                .collect();
        }

        debug!("kensa configuration after env overrides: {self:#?}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn sample_path() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("kensa-sample.toml")
    }

    #[test]
    #[serial]
    fn load_sample_config() -> eyre::Result<()> {
        let cfg = Config::load_from(&sample_path())?;
        assert_eq!(cfg.logging, true);
        assert_eq!(cfg.strict_keys, false);
        assert_eq!(
            cfg.ignored_headers,
            vec!["date".to_string(), "content-length".to_string()]
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn missing_file_yields_defaults() -> eyre::Result<()> {
        let cfg = Config::load_from(Path::new("/nonexistent/kensa.toml"))?;
        assert_eq!(cfg, Config::default());
        Ok(())
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str("strict_keys = true").unwrap();
        assert!(cfg.logging);
        assert!(cfg.strict_keys);
        assert!(cfg.ignored_headers.is_empty());
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() -> eyre::Result<()> {
        std::env::set_var("KENSA_LOGGING", "false");
        std::env::set_var("KENSA_STRICT_KEYS", "true");
        std::env::set_var("KENSA_IGNORED_HEADERS", "server, x-request-id");
        let cfg = Config::load_from(&sample_path());
        std::env::remove_var("KENSA_LOGGING");
        std::env::remove_var("KENSA_STRICT_KEYS");
        std::env::remove_var("KENSA_IGNORED_HEADERS");

        let cfg = cfg?;
        assert_eq!(cfg.logging, false);
        assert_eq!(cfg.strict_keys, true);
        assert_eq!(
            cfg.ignored_headers,
            vec!["server".to_string(), "x-request-id".to_string()]
        );
        Ok(())
    }

    mod kensa_config_env {
        use super::super::{Config, KENSA_CONFIG_ENV};
        use serial_test::serial;
        use test_case::test_case;

        #[test]
        #[serial]
        fn load_from_kensa_config_env() {
            let config_path = super::sample_path();

            std::env::set_var(KENSA_CONFIG_ENV, config_path.to_str().unwrap());
            let cfg = Config::load().unwrap();
            std::env::remove_var(KENSA_CONFIG_ENV);

            assert!(cfg.logging);
        }

        #[test]
        #[serial]
        fn error_when_file_not_found() {
            std::env::set_var(KENSA_CONFIG_ENV, "/nonexistent/path/kensa.toml");
            let result = Config::load();
            std::env::remove_var(KENSA_CONFIG_ENV);

            assert!(result.is_err());
            let err = result.unwrap_err().to_string();
            assert!(
                err.contains("not found"),
                "error should mention file not found: {err}"
            );
        }

        #[test_case("true"; "boolean value")]
        #[test_case("123"; "numeric value")]
        #[test_case("some_value"; "string value")]
        #[serial]
        fn error_when_value_looks_like_config_value(value: &str) {
            std::env::set_var(KENSA_CONFIG_ENV, value);
            let result = Config::load();
            std::env::remove_var(KENSA_CONFIG_ENV);

            assert!(result.is_err());
            let err = result.unwrap_err().to_string();
            assert!(
                err.contains("should be a path"),
                "error should guide user: {err}"
            );
        }
    }
}
