//! Error types for VRT packet and frame processing.
//!
//! Errors fall into three families that callers are expected to tell apart:
//!
//! - **Structural errors**: the bytes are malformed (truncated buffer, bad sync
//!   word, length mismatch, reserved bits set). Reported by the validity checks
//!   (`check_valid`) and by whole-buffer operations such as walking a frame.
//! - **Misuse errors**: the caller asked for something illegal (mutating a
//!   read-only view, a value outside a field's legal range, the wrong packet
//!   type for a view). Raised at the point of misuse, never clamped.
//! - **Unsupported operations**: the request is well formed but this packet or
//!   configuration cannot honour it (pad bits on a context packet, a payload
//!   item format with no native conversion).
//!
//! Plain field accessors never return errors for absent fields; they return
//! `None`.
//!
//! ```rust
//! use vrtkit::VrtError;
//!
//! let error = VrtError::read_only("set_stream_identifier");
//! assert!(error.is_misuse());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for VRT operations.
pub type Result<T, E = VrtError> = std::result::Result<T, E>;

/// Main error type for VRT operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VrtError {
    #[error("Invalid packet: {reason}")]
    InvalidPacket { reason: String },

    #[error("Invalid VRL frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    #[error("Cannot {operation} on a read-only buffer")]
    ReadOnly { operation: String },

    #[error("Invalid value for {field}: {details}")]
    InvalidArgument { field: String, details: String },

    #[error("Wrong packet type: expected {expected}, found {found}")]
    WrongPacketType { expected: String, found: String },

    #[error("Unsupported operation {operation}: {reason}")]
    Unsupported { operation: String, reason: String },

    #[error("Configuration error: {details}")]
    Config {
        details: String,
        #[source]
        source: Option<serde_yaml_ng::Error>,
    },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },
}

impl VrtError {
    /// Returns whether this error describes malformed bytes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            VrtError::InvalidPacket { .. } | VrtError::InvalidFrame { .. } | VrtError::Parse { .. }
        )
    }

    /// Returns whether this error was caused by a caller bug.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            VrtError::BufferTooShort { .. }
                | VrtError::ReadOnly { .. }
                | VrtError::InvalidArgument { .. }
                | VrtError::WrongPacketType { .. }
        )
    }

    /// Returns whether the operation is not available on this packet type or
    /// configuration.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, VrtError::Unsupported { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            VrtError::InvalidPacket { .. } => vec![
                "Check the packet size field against the received byte count",
                "Verify the sender's VITA-49 protocol version",
                "Drop the packet and resynchronise on the next one",
            ],
            VrtError::InvalidFrame { .. } => vec![
                "Check the VRL sync word and frame length",
                "Verify the CRC is computed over header and packets",
                "Walk contained packets manually to salvage valid ones",
            ],
            VrtError::BufferTooShort { .. } => vec![
                "Supply at least the fixed header length",
                "Read the full packet size before constructing a view",
            ],
            VrtError::ReadOnly { .. } => vec![
                "Copy the view into an owned packet before mutating it",
            ],
            VrtError::InvalidArgument { .. } => vec![
                "Check the documented legal range of the field",
                "Pass None to remove an optional field instead of a sentinel",
            ],
            VrtError::WrongPacketType { .. } => vec![
                "Use the view matching the packet type",
                "Build views through a PacketFactory",
            ],
            VrtError::Unsupported { .. } => vec![
                "Check the configured protocol version",
                "Use a packet type that carries this field",
            ],
            VrtError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Use one of the documented protocol versions",
            ],
            VrtError::File { .. } => vec![
                "Check the capture file exists and is readable",
                "Check file permissions",
            ],
            VrtError::Parse { .. } => vec![
                "Verify the capture holds VRT packets or VRL frames",
                "Check for truncation at the end of the capture",
            ],
        }
    }

    /// Helper constructor for structural packet errors.
    pub fn invalid_packet(reason: impl Into<String>) -> Self {
        VrtError::InvalidPacket { reason: reason.into() }
    }

    /// Helper constructor for structural frame errors.
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        VrtError::InvalidFrame { reason: reason.into() }
    }

    /// Helper constructor for out-of-range values.
    pub fn invalid_argument(field: impl Into<String>, details: impl Into<String>) -> Self {
        VrtError::InvalidArgument { field: field.into(), details: details.into() }
    }

    /// Helper constructor for mutations attempted on a read-only view.
    pub fn read_only(operation: impl Into<String>) -> Self {
        VrtError::ReadOnly { operation: operation.into() }
    }

    /// Helper constructor for unsupported operations.
    pub fn unsupported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        VrtError::Unsupported { operation: operation.into(), reason: reason.into() }
    }

    /// Helper constructor for parse failures while reading captures.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        VrtError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for VrtError {
    fn from(err: std::io::Error) -> Self {
        VrtError::File { path: PathBuf::from("<stream>"), source: err }
    }
}
