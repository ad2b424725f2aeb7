//! Error types for instrument-network processing.
//!
//! This module provides the error handling for the xipp-trial library.
//! All errors implement the `std::error::Error` trait and carry structured
//! context for diagnostics and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: socket send/receive failures
//! - **Frame Errors**: truncated or malformed frames inside a datagram
//! - **Parse Errors**: property payloads that do not match their type tag
//! - **Schema Errors**: an Operator speaking an incompatible property schema
//! - **Command Errors**: user commands that are illegal for the current trial status
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use xipp_trial::XippError;
//!
//! let error = XippError::send_failure(3, 12, Some(0));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for instrument-network operations.
pub type Result<T, E = XippError> = std::result::Result<T, E>;

/// Main error type for instrument-network operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum XippError {
    #[error("Transport error during {operation}")]
    Transport {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Datagram send failed after {attempts} attempts: expected {expected_bytes} bytes, last accepted {last_sent:?}"
    )]
    SendFailure { attempts: u32, expected_bytes: usize, last_sent: Option<usize> },

    #[error("Truncated frame at offset {offset}: frame needs {frame_len} bytes, {available} available")]
    TruncatedFrame { offset: usize, frame_len: usize, available: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error(
        "Property schema mismatch: expected {}.{}, found {}.{}",
        expected.0, expected.1, found.0, found.1
    )]
    SchemaMismatch { expected: (u8, u8), found: (u8, u8) },

    #[error("Command '{command}' rejected: {reason}")]
    CommandRejected { command: String, reason: String },

    #[error("Payload of {bytes} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { bytes: usize, max: usize },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Trial session is no longer running")]
    SessionClosed,
}

impl XippError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            XippError::Transport { .. } => true,
            XippError::SendFailure { .. } => true,
            XippError::TruncatedFrame { .. } => true,
            XippError::Parse { .. } => false,
            XippError::SchemaMismatch { .. } => false,
            XippError::CommandRejected { .. } => false,
            XippError::PayloadTooLarge { .. } => false,
            XippError::Config { .. } => false,
            XippError::SessionClosed => false,
        }
    }

    /// Returns whether the session loop must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            XippError::Transport { .. } | XippError::SchemaMismatch { .. } | XippError::SessionClosed
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            XippError::Transport { .. } => vec![
                "Check the network adapter is on the instrument subnet",
                "Verify no other process holds the listening port exclusively",
                "Restart the session",
            ],
            XippError::SendFailure { .. } => vec![
                "Check the request address and port",
                "Verify the interface allows broadcast traffic",
                "Retry the command",
            ],
            XippError::TruncatedFrame { .. } => vec![
                "Ignore: the rest of the datagram was dropped",
                "Check for packet corruption on the instrument network",
            ],
            XippError::Parse { .. } => vec![
                "Check the Operator firmware version",
                "Verify the property type tag matches its payload",
            ],
            XippError::SchemaMismatch { .. } => vec![
                "Update the Operator software to a compatible version",
                "Update this library to match the Operator property schema",
            ],
            XippError::CommandRejected { .. } => vec![
                "Query the trial to refresh its status",
                "Choose an action permitted for the current status",
            ],
            XippError::PayloadTooLarge { .. } => vec![
                "Shorten string values before writing",
                "Check the property definition for its maximum length",
            ],
            XippError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Compare values against the documented defaults",
            ],
            XippError::SessionClosed => vec![
                "Open a new connection",
                "Inspect the session result for the failure that closed it",
            ],
        }
    }

    /// Helper constructor for transport errors with operation context.
    pub fn transport(operation: impl Into<String>, source: std::io::Error) -> Self {
        XippError::Transport { operation: operation.into(), source }
    }

    /// Helper constructor for send failures.
    pub fn send_failure(attempts: u32, expected_bytes: usize, last_sent: Option<usize>) -> Self {
        XippError::SendFailure { attempts, expected_bytes, last_sent }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        XippError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for rejected commands.
    pub fn command_rejected(command: impl Into<String>, reason: impl Into<String>) -> Self {
        XippError::CommandRejected { command: command.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        XippError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for XippError {
    fn from(err: std::io::Error) -> Self {
        XippError::Transport { operation: "<unknown>".to_string(), source: err }
    }
}
