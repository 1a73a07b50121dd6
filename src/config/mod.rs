use crate::error::{IocmanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a configured unit behaves when an action is invoked on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A long-running child process launched through the shell
    #[default]
    Process,
    /// A liveness check: actions bump a counter, no process is ever spawned
    Heartbeat,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Process => write!(f, "process"),
            UnitKind::Heartbeat => write!(f, "heartbeat"),
        }
    }
}

/// One entry of the `units` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unit name (unique identifier, also the log file prefix)
    pub name: String,

    /// Shell invocation string
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub kind: UnitKind,
}

impl UnitConfig {
    pub fn process(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            kind: UnitKind::Process,
        }
    }

    pub fn heartbeat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: String::new(),
            kind: UnitKind::Heartbeat,
        }
    }
}

/// Supervisor-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Directory receiving one log file per launch
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Grace period between SIGTERM and SIGKILL (in seconds)
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Status and metrics polling cadence (in seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Shell used to interpret unit commands
    #[serde(default = "default_shell")]
    pub shell: PathBuf,

    /// Unix socket the daemon listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Number of metrics samples retained
    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,
}

// Default value functions for serde
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_stop_timeout() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    2
}

fn default_shell() -> PathBuf {
    PathBuf::from("/bin/sh")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(crate::ipc::DEFAULT_SOCKET_PATH)
}

fn default_metrics_capacity() -> usize {
    900
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            stop_timeout_secs: default_stop_timeout(),
            poll_interval_secs: default_poll_interval(),
            shell: default_shell(),
            socket_path: default_socket_path(),
            metrics_capacity: default_metrics_capacity(),
        }
    }
}

impl SupervisorSettings {
    /// Get stop timeout as Duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Get polling interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stop_timeout_secs == 0 {
            return Err(IocmanError::ConfigError(
                "stop_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(IocmanError::ConfigError(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }

        if self.metrics_capacity < 2 {
            return Err(IocmanError::ConfigError(
                "metrics_capacity must be at least 2".to_string(),
            ));
        }

        if self.shell.as_os_str().is_empty() {
            return Err(IocmanError::ConfigError("shell must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Determine format based on file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        match extension {
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(IocmanError::InvalidConfig(format!(
                "Unsupported file format: {}. Use .toml, .json or .yaml",
                extension
            ))),
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Ordered unit definitions. `IOCs` is accepted for existing deployments.
    #[serde(default, alias = "IOCs")]
    pub units: Vec<UnitConfig>,
}

impl Config {
    /// Load the configuration from a file (supports TOML, JSON and YAML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IocmanError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let format = ConfigFormat::from_path(path)?;
        Self::parse(&contents, format)
    }

    /// Parse, expand and validate configuration text
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self> {
        let mut config: Config = match format {
            ConfigFormat::Toml => toml::from_str(contents)
                .map_err(|e| IocmanError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?,
            ConfigFormat::Json => serde_json::from_str(contents)
                .map_err(|e| IocmanError::InvalidConfig(format!("Failed to parse JSON: {}", e)))?,
            ConfigFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| IocmanError::InvalidConfig(format!("Failed to parse YAML: {}", e)))?,
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Validate supervisor settings. Unit-level checks belong to the registry.
    pub fn validate(&self) -> Result<()> {
        self.supervisor.validate()?;

        if self.units.is_empty() {
            return Err(IocmanError::InvalidConfig(
                "No unit configuration found in file".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand environment variables in path settings.
    /// Unit commands are left alone, the shell expands them at launch.
    fn expand_env_vars(&mut self) {
        self.supervisor.log_dir = expand_env_in_path(&self.supervisor.log_dir);
        self.supervisor.socket_path = expand_env_in_path(&self.supervisor.socket_path);
    }
}

/// Expand `$VAR` and `${VAR}` references. Unset variables are kept verbatim.
fn expand_env_in_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => result.push_str(&value),
            _ => result.push_str(&rest[pos..pos + 1 + consumed]),
        }

        rest = &after[consumed..];
    }

    result.push_str(rest);
    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}
