//! Configuration loading.
//!
//! Hierarchical merge, lowest to highest precedence: programmatic
//! defaults, the YAML config file, then `LOGWARDEN_`-prefixed
//! environment variables. The data directory additionally honors the
//! `CONTROL_DATA_DIR` override used by ops tooling.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::models::Config;

/// Environment override for the control-plane data directory.
pub const DATA_DIR_ENV: &str = "CONTROL_DATA_DIR";

/// Default config file consulted when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "logwarden.yaml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, merging the file at `path` when present.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed("LOGWARDEN_").split("__"))
            .extract()
            .context("failed to extract configuration")?;

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.database.data_dir = dir.trim().to_string();
            }
        }

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        anyhow::ensure!(
            valid_levels.contains(&config.logging.level.as_str()),
            "invalid logging.level {:?}; expected one of {:?}",
            config.logging.level,
            valid_levels
        );

        let valid_formats = ["json", "pretty"];
        anyhow::ensure!(
            valid_formats.contains(&config.logging.format.as_str()),
            "invalid logging.format {:?}; expected one of {:?}",
            config.logging.format,
            valid_formats
        );

        anyhow::ensure!(
            !config.database.data_dir.trim().is_empty(),
            "database.data_dir cannot be empty"
        );
        anyhow::ensure!(
            !config.server.listen.trim().is_empty(),
            "server.listen cannot be empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_file() {
        let config = ConfigLoader::load(Some(Path::new("/nonexistent/logwarden.yaml"))).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8787");
        assert_eq!(config.dispatch.assign_timeout_secs, 30);
        assert_eq!(config.dispatch.run_timeout_secs, 600);
        assert_eq!(config.dispatch.offline_after_secs, 45);
        assert!(!config.ai.enabled);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  listen: 0.0.0.0:9000\nai:\n  enabled: true\n  max_lines: 400\nwatch_dir: /var/log/apps"
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert!(config.ai.enabled);
        assert_eq!(config.ai.max_lines, 400);
        assert_eq!(config.watch_dir_list(), vec!["/var/log/apps"]);
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: loud").unwrap();
        assert!(ConfigLoader::load(Some(file.path())).is_err());
    }
}
