//! Error types for connection managers and connections.

use thiserror::Error;

/// Error raised by a [`Driver`](crate::Driver) while opening, checking or
/// closing a resource instance.
///
/// Drivers are opaque to this crate, so their failures are carried as boxed
/// trait objects and surfaced unchanged through [`ConnError::Driver`].
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Connection lifecycle errors
///
/// Every variant except [`ConnError::Driver`] is a contract violation by the
/// caller (wrong state, wrong order, closed manager). None of them are retried.
///
/// # Examples
///
/// ```rust
/// use ferrous_conn::ConnError;
///
/// let closed = ConnError::ManagerUnavailable;
/// assert_eq!(closed.to_string(), "Connection manager is unavailable");
/// assert!(closed.is_closed());
///
/// let busy = ConnError::ConnectionNotAvailable;
/// assert_eq!(busy.to_string(), "Connection is not available");
/// assert!(!busy.is_closed());
/// ```
#[derive(Debug, Error)]
pub enum ConnError {
    /// create/get/close called after the manager was closed
    #[error("Connection manager is unavailable")]
    ManagerUnavailable,
    /// close() called on a manager that is already closed
    #[error("Connection manager is already closed")]
    ManagerAlreadyClosed,
    /// getInstance/release/detach on a connection that is not Available
    #[error("Connection is not available")]
    ConnectionNotAvailable,
    /// Low-level release entry point reached without going through release()
    #[error("Connection is not in wait release status")]
    ConnectionNotInWaitRelease,
    /// Connection handed to a manager that did not issue it
    #[error("Connection does not belong to this manager")]
    ForeignConnection,
    /// Statistics requested from a manager built without them
    #[error("Connection manager statistics is disabled")]
    StatisticsDisabled,
    /// Connection requested for, or hook registered on, an ended context
    #[error("Request context has already ended")]
    ContextEnded,
    /// Bounded pool has no idle connection and no spare capacity
    #[error("Connection pool exhausted: all {0} connections are in use")]
    PoolExhausted(usize),
    /// Registry already holds a manager under this name
    #[error("Connection manager '{0}' is already registered")]
    DuplicateManager(String),
    /// Manager configuration rejected at construction
    #[error("Invalid connection manager configuration: {0}")]
    Configuration(String),
    /// Failure reported by the driver
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),
}

impl ConnError {
    /// Wraps any driver-side error.
    pub fn driver(err: impl Into<DriverError>) -> Self {
        ConnError::Driver(err.into())
    }

    /// True for the two errors a closed manager reports.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnError::ManagerUnavailable | ConnError::ManagerAlreadyClosed)
    }
}

/// Result type for connection operations
pub type ConnResult<T> = Result<T, ConnError>;
