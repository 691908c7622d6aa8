//! Error types for the watchdog library

use std::time::Duration;

/// Failure of a container-runtime call
///
/// None of these are fatal: callers log them and let the next tick retry.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container {0} not found")]
    NotFound(String),
    #[error("container {0} is already in the requested state")]
    NotModified(String),
    #[error("{operation} on {name} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        name: String,
        timeout: Duration,
    },
    #[error("docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("{0}")]
    Other(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, RuntimeError::NotModified(_))
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Invalid watchdog configuration, reported at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {field}: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_display() {
        let err = RuntimeError::Timeout {
            operation: "restart",
            name: "mulecube-kiwix".to_string(),
            timeout: Duration::from_secs(40),
        };
        assert_eq!(err.to_string(), "restart on mulecube-kiwix timed out after 40s");
        assert!(RuntimeError::NotFound("x".into()).is_not_found());
        assert!(RuntimeError::NotModified("x".into()).is_not_modified());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            field: "BATTERY_SHED_PERCENT",
            value: "120".to_string(),
            reason: "must be between 0 and 100",
        };
        assert!(err.to_string().contains("BATTERY_SHED_PERCENT"));
        assert!(err.to_string().contains("120"));
    }
}
