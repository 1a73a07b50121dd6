use thiserror::Error;

/// Main error type for the IOC manager
#[derive(Debug, Error)]
pub enum IocmanError {
    // Unit registry / configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Duplicate unit name in configuration: {0}")]
    DuplicateUnit(String),

    // Lifecycle errors
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Failed to launch unit {0}: {1}")]
    LaunchError(String, String),

    #[error("Supervisor is shutting down")]
    ShuttingDown,

    /// Best-effort termination failure. Only ever logged, never returned from `stop`.
    #[error("Termination of unit {0} was not confirmed: {1}")]
    TerminationWarning(String, String),

    // Log-related errors
    #[error("Log error: {0}")]
    LogError(String),

    #[error("Failed to open log file: {0}")]
    LogFileError(String),

    #[error("Log file not found: {0}")]
    LogNotFound(String),

    // IPC-related errors
    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Failed to connect to daemon: {0}")]
    ConnectionError(String),

    #[error("IPC protocol error: {0}")]
    ProtocolError(String),

    #[error("Daemon not running")]
    DaemonNotRunning,

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("{0}")]
    Other(String),
}

impl IocmanError {
    /// Whether this error belongs to the load-time configuration family
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            IocmanError::ConfigError(_)
                | IocmanError::InvalidConfig(_)
                | IocmanError::DuplicateUnit(_)
        )
    }
}

/// Result type alias for IOC manager operations
pub type Result<T> = std::result::Result<T, IocmanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_family() {
        assert!(IocmanError::DuplicateUnit("a".to_string()).is_config_error());
        assert!(IocmanError::InvalidConfig("bad".to_string()).is_config_error());
        assert!(!IocmanError::UnitNotFound("a".to_string()).is_config_error());
    }

    #[test]
    fn test_error_messages() {
        let err = IocmanError::LaunchError("svc1".to_string(), "no shell".to_string());
        assert_eq!(err.to_string(), "Failed to launch unit svc1: no shell");

        let err = IocmanError::UnitNotFound("ghost".to_string());
        assert_eq!(err.to_string(), "Unit not found: ghost");
    }
}
