//! Failure taxonomy shared by every resilience layer
//!
//! [`ResilienceError`] is generic over the wrapped operation's error type so
//! the caller's own error is preserved untouched, while rejections and
//! exhaustion get their own variants. Layers that wrap other layers produce
//! `ResilienceError<ResilienceError<E>>`; [`ResilienceError::flatten`] collapses
//! that back to a single level before it reaches the caller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Simple configuration error for policy validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur in resilience operations
///
/// `Display` and `Error` are implemented by hand: `RetryExhausted` nests the
/// enum inside itself, which a derived `Error` bound cannot resolve.
#[derive(Debug)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open; the operation was not invoked
    CircuitOpen { name: String },

    /// No bulkhead permit was available; the operation was not invoked
    BulkheadFull { name: String, max_concurrent: usize },

    /// Every permitted attempt failed
    RetryExhausted { name: String, attempts: u32, source: Box<ResilienceError<E>> },

    /// A single attempt exceeded its deadline
    Timeout { timeout: Duration },

    /// The underlying operation failed
    OperationFailed { source: E },

    /// A policy failed validation before anything ran
    InvalidConfiguration { message: String },
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen { name } => {
                write!(f, "Circuit breaker '{name}' is open, rejecting calls")
            }
            Self::BulkheadFull { name, max_concurrent } => {
                write!(f, "Bulkhead '{name}' is full: {max_concurrent} concurrent calls in flight")
            }
            Self::RetryExhausted { name, attempts, .. } => {
                write!(f, "Retry '{name}' exhausted after {attempts} attempts")
            }
            Self::Timeout { timeout } => write!(f, "Operation timed out after {timeout:?}"),
            Self::OperationFailed { source } => write!(f, "Operation failed: {source}"),
            Self::InvalidConfiguration { message } => {
                write!(f, "Invalid configuration: {message}")
            }
        }
    }
}

impl<E> std::error::Error for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RetryExhausted { source, .. } => Some(source.as_ref()),
            Self::OperationFailed { source } => Some(source),
            _ => None,
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Coarse classification of a [`ResilienceError`], used for metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CircuitOpen,
    BulkheadFull,
    RetryExhausted,
    Timeout,
    Operation,
    InvalidConfiguration,
}

impl ErrorKind {
    /// Stable label for metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::BulkheadFull => "bulkhead_full",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Operation => "operation",
            ErrorKind::InvalidConfiguration => "invalid_configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Wrap a failure of the underlying operation
    pub fn operation(source: E) -> Self {
        Self::OperationFailed { source }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::BulkheadFull { .. } => ErrorKind::BulkheadFull,
            Self::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::OperationFailed { .. } => ErrorKind::Operation,
            Self::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
        }
    }

    /// True when a policy refused the call before the operation ran
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::BulkheadFull { .. })
    }

    /// Borrow the operation's own error, looking through retry exhaustion
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::RetryExhausted { source, .. } => source.operation_error(),
            _ => None,
        }
    }

    /// Recover the operation's own error, looking through retry exhaustion
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::RetryExhausted { source, .. } => (*source).into_operation_error(),
            _ => None,
        }
    }
}

impl<E> ResilienceError<ResilienceError<E>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Collapse an error produced by a layer that wrapped another layer.
    ///
    /// `OperationFailed` of the outer layer is the inner layer's error and is
    /// returned as-is; every other variant keeps its meaning.
    pub fn flatten(self) -> ResilienceError<E> {
        match self {
            Self::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            Self::BulkheadFull { name, max_concurrent } => {
                ResilienceError::BulkheadFull { name, max_concurrent }
            }
            Self::RetryExhausted { name, attempts, source } => ResilienceError::RetryExhausted {
                name,
                attempts,
                source: Box::new((*source).flatten()),
            },
            Self::Timeout { timeout } => ResilienceError::Timeout { timeout },
            Self::OperationFailed { source } => source,
            Self::InvalidConfiguration { message } => {
                ResilienceError::InvalidConfiguration { message }
            }
        }
    }
}

impl<E> From<ConfigError> for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid { message } => Self::InvalidConfiguration { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    type Nested = ResilienceError<ResilienceError<std::io::Error>>;

    fn io(msg: &str) -> std::io::Error {
        std::io::Error::other(msg.to_string())
    }

    #[test]
    fn test_kind_labels() {
        let err: ResilienceError<std::io::Error> =
            ResilienceError::CircuitOpen { name: "dbCircuitBreaker".into() };
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert_eq!(err.kind().to_string(), "circuit_open");
        assert!(err.is_rejection());

        let err = ResilienceError::operation(io("boom"));
        assert_eq!(err.kind(), ErrorKind::Operation);
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_flatten_operation_failed_unwraps_inner() {
        let nested: Nested =
            ResilienceError::OperationFailed { source: ResilienceError::Timeout { timeout: Duration::from_millis(5) } };

        let flat = nested.flatten();
        assert!(matches!(flat, ResilienceError::Timeout { timeout } if timeout == Duration::from_millis(5)));
    }

    #[test]
    fn test_flatten_keeps_retry_exhaustion_cause() {
        let nested: Nested = ResilienceError::RetryExhausted {
            name: "dbRetry".into(),
            attempts: 3,
            source: Box::new(ResilienceError::OperationFailed {
                source: ResilienceError::operation(io("last")),
            }),
        };

        let flat = nested.flatten();
        match &flat {
            ResilienceError::RetryExhausted { attempts, source, .. } => {
                assert_eq!(*attempts, 3);
                assert_eq!(source.kind(), ErrorKind::Operation);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(flat.operation_error().map(ToString::to_string), Some("last".to_string()));
        assert!(flat.source().is_some());
    }

    #[test]
    fn test_into_operation_error() {
        let err: ResilienceError<std::io::Error> = ResilienceError::RetryExhausted {
            name: "r".into(),
            attempts: 2,
            source: Box::new(ResilienceError::operation(io("cause"))),
        };
        assert_eq!(err.into_operation_error().map(|e| e.to_string()), Some("cause".to_string()));

        let err: ResilienceError<std::io::Error> =
            ResilienceError::BulkheadFull { name: "b".into(), max_concurrent: 2 };
        assert!(err.into_operation_error().is_none());
    }

    #[test]
    fn test_display_and_source_chain() {
        let err: ResilienceError<std::io::Error> = ResilienceError::RetryExhausted {
            name: "dbRetry".into(),
            attempts: 3,
            source: Box::new(ResilienceError::operation(io("refused"))),
        };
        assert_eq!(err.to_string(), "Retry 'dbRetry' exhausted after 3 attempts");

        let cause = err.source().expect("exhaustion cause");
        assert_eq!(cause.to_string(), "Operation failed: refused");
        assert_eq!(cause.source().map(ToString::to_string), Some("refused".to_string()));

        let err: ResilienceError<std::io::Error> =
            ResilienceError::Timeout { timeout: Duration::from_millis(250) };
        assert!(err.source().is_none());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ResilienceError<std::io::Error> =
            ConfigError::invalid("max_attempts must be greater than 0").into();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert!(err.to_string().contains("max_attempts"));
    }
}
