//! Unified error handling for the journey-telemetry library.
//!
//! Geocoding never surfaces these errors to callers of `GeoLookup` (it degrades
//! to sentinel strings), but every other fallible operation returns [`Result`].

use std::fmt;

/// Unified error type for journey-telemetry operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryError {
    /// Malformed coordinates, out-of-order samples or an empty route
    InvalidInput { message: String },
    /// Geocoding or memoized HTTP request failed
    NetworkFailure {
        message: String,
        status_code: Option<u16>,
    },
    /// No authenticated user when a journey is persisted
    NotAuthenticated,
    /// The external journey store rejected the operation
    StoreFailure { message: String },
    /// Configuration error
    ConfigError { message: String },
    /// A rate controller was invoked after `dispose()`
    Disposed { controller: &'static str },
}

impl TelemetryError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        TelemetryError::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn network(message: impl Into<String>, status_code: Option<u16>) -> Self {
        TelemetryError::NetworkFailure {
            message: message.into(),
            status_code,
        }
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        TelemetryError::StoreFailure {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        TelemetryError::ConfigError {
            message: message.into(),
        }
    }
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            TelemetryError::NetworkFailure {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Network failure ({}): {}", code, message)
                } else {
                    write!(f, "Network failure: {}", message)
                }
            }
            TelemetryError::NotAuthenticated => write!(f, "User not authenticated"),
            TelemetryError::StoreFailure { message } => {
                write!(f, "Journey store failure: {}", message)
            }
            TelemetryError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            TelemetryError::Disposed { controller } => {
                write!(f, "{} has been disposed", controller)
            }
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Result type alias for journey-telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Extension trait for converting Option to TelemetryError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an invalid input error.
    fn ok_or_invalid(self, message: &str) -> Result<T>;

    /// Convert an absent user id into `NotAuthenticated`.
    fn ok_or_unauthenticated(self) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TelemetryError::invalid_input(message))
    }

    fn ok_or_unauthenticated(self) -> Result<T> {
        self.ok_or(TelemetryError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::NetworkFailure {
            message: "timed out".to_string(),
            status_code: Some(503),
        };
        assert_eq!(err.to_string(), "Network failure (503): timed out");

        let err = TelemetryError::invalid_input("route is empty");
        assert!(err.to_string().contains("route is empty"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<String> = None;
        assert_eq!(
            none.clone().ok_or_unauthenticated(),
            Err(TelemetryError::NotAuthenticated)
        );
        assert!(matches!(
            none.ok_or_invalid("missing"),
            Err(TelemetryError::InvalidInput { .. })
        ));
    }
}
