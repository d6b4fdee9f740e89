//! Error types for debugbus.

use thiserror::Error;

/// Main error type for all debugbus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Packet storage could not be allocated with the requested size.
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// A received frame violates length or alignment requirements.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A header field value is out of range for its bit width.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// The bus endpoint could not be bound.
    #[error("Bind error on endpoint '{endpoint}': {reason}")]
    Bind { endpoint: String, reason: String },

    /// The forwarding activity could not be brought up.
    #[error("Startup error: {0}")]
    Startup(String),

    /// The forwarding activity could not be confirmed stopped.
    ///
    /// This is fatal for the controller; further starts are rejected.
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// A lifecycle precondition was broken by the caller
    /// (double-start, stop while stopped, start after a failed stop).
    #[error("Contract violation: {0}")]
    ContractViolation(&'static str),

    /// The peer or bus connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using BusError.
pub type Result<T> = std::result::Result<T, BusError>;
