//! Configuration model.
//!
//! The loaded config is an immutable snapshot; handlers receive it by
//! reference and live reconfiguration is out of scope.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default AI request timeout when `ai.timeout` is empty or unparseable.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(20);

/// Default line budget for AI summaries.
pub const DEFAULT_AI_MAX_LINES: usize = 200;

/// Top-level configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
    pub ai: AiConfig,
    /// Delimited list of watched directories; members of the AI path
    /// allow-list.
    pub watch_dir: String,
    /// Delimited list of extra allow-listed log files or directories.
    pub alert_log_paths: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            dispatch: DispatchConfig::default(),
            ai: AiConfig::default(),
            watch_dir: String::new(),
            alert_log_paths: String::new(),
        }
    }
}

impl Config {
    pub fn watch_dir_list(&self) -> Vec<String> {
        split_path_list(&self.watch_dir)
    }

    pub fn alert_log_path_list(&self) -> Vec<String> {
        split_path_list(&self.alert_log_paths)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the control-plane database. Overridden by the
    /// `CONTROL_DATA_DIR` environment variable.
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/control".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// json | pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Dispatcher timeout thresholds, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub assign_timeout_secs: u64,
    pub run_timeout_secs: u64,
    pub offline_after_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            assign_timeout_secs: 30,
            run_timeout_secs: 600,
            offline_after_secs: 45,
        }
    }
}

/// AI summary engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Duration string (`20s`, `1m`) or bare integer seconds.
    pub timeout: String,
    /// Upper bound on lines handed to the model per request.
    pub max_lines: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            timeout: String::new(),
            max_lines: DEFAULT_AI_MAX_LINES,
        }
    }
}

impl AiConfig {
    /// Parse the configured timeout. Accepts a humantime duration string
    /// or a bare integer meaning seconds; anything else yields 20s.
    pub fn request_timeout(&self) -> Duration {
        let raw = self.timeout.trim();
        if raw.is_empty() {
            return DEFAULT_AI_TIMEOUT;
        }
        if let Ok(secs) = raw.parse::<u64>() {
            if secs > 0 {
                return Duration::from_secs(secs);
            }
            return DEFAULT_AI_TIMEOUT;
        }
        humantime::parse_duration(raw).unwrap_or(DEFAULT_AI_TIMEOUT)
    }

    /// Effective line budget: positive configured value or the default.
    pub fn effective_max_lines(&self) -> usize {
        if self.max_lines == 0 {
            DEFAULT_AI_MAX_LINES
        } else {
            self.max_lines
        }
    }
}

/// Split a configured path list on commas, semicolons, whitespace, and
/// their full-width equivalents, dropping empty entries.
pub fn split_path_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c == '，' || c == '；' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_accepts_duration_strings_and_integers() {
        let mut ai = AiConfig {
            timeout: "45s".to_string(),
            ..AiConfig::default()
        };
        assert_eq!(ai.request_timeout(), Duration::from_secs(45));

        ai.timeout = "30".to_string();
        assert_eq!(ai.request_timeout(), Duration::from_secs(30));

        ai.timeout = "2m".to_string();
        assert_eq!(ai.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn timeout_defaults_on_empty_or_garbage() {
        let mut ai = AiConfig::default();
        assert_eq!(ai.request_timeout(), DEFAULT_AI_TIMEOUT);

        ai.timeout = "soon".to_string();
        assert_eq!(ai.request_timeout(), DEFAULT_AI_TIMEOUT);

        ai.timeout = "0".to_string();
        assert_eq!(ai.request_timeout(), DEFAULT_AI_TIMEOUT);
    }

    #[test]
    fn max_lines_zero_falls_back_to_default() {
        let ai = AiConfig {
            max_lines: 0,
            ..AiConfig::default()
        };
        assert_eq!(ai.effective_max_lines(), DEFAULT_AI_MAX_LINES);
    }

    #[test]
    fn path_list_splits_on_mixed_delimiters() {
        let parsed = split_path_list("/var/log/a.log, /var/log/b.log;/tmp/c.log　/d.log，/e.log；/f.log");
        assert_eq!(
            parsed,
            vec![
                "/var/log/a.log",
                "/var/log/b.log",
                "/tmp/c.log",
                "/d.log",
                "/e.log",
                "/f.log"
            ]
        );
    }

    #[test]
    fn path_list_empty_input_is_empty() {
        assert!(split_path_list("").is_empty());
        assert!(split_path_list("  ,; ").is_empty());
    }
}
