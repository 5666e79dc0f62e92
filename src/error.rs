//! Error types for edgesnmp.
//!
//! This module provides:
//!
//! - [`Error`] - the main error type covering all failure modes
//! - [`ErrorStatus`] - SNMP protocol errors returned by agents (RFC 3416)
//! - [`DecodeErrorKind`] - detailed BER decode failure classification
//!
//! # Error Handling
//!
//! ```rust
//! use edgesnmp::{Error, Result};
//!
//! fn handle_error(result: Result<()>) {
//!     match result {
//!         Ok(()) => println!("success"),
//!         Err(Error::Timeout { target, retries, .. }) => {
//!             println!("{} unreachable after {} retries", target, retries);
//!         }
//!         Err(Error::Snmp { status, index, .. }) => {
//!             println!("agent error {} at index {}", status, index);
//!         }
//!         Err(e) => println!("error: {}", e),
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all edgesnmp operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// BER decode failure at a byte offset.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// Invalid OID string or arc constraints.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),

    /// Network I/O failure (send/recv/bind/connect).
    #[error("I/O error{}: {source}", fmt_target(.target))]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out after all retries were exhausted.
    #[error("timeout after {elapsed:?} waiting for {target} ({retries} retries)")]
    Timeout {
        target: SocketAddr,
        elapsed: Duration,
        retries: u32,
    },

    /// SNMP protocol error reported by the agent (error-status != 0).
    ///
    /// `index` is the 1-based varbind index from the wire; `oid` is the
    /// corresponding request OID when the index is in range.
    #[error("SNMP error from {target}: {status} at index {index}")]
    Snmp {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// Operation attempted on a client that is not connected.
    #[error("client is not connected")]
    NotConnected,

    /// Connect attempted on a client that is already connected.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The client was closed while the request was in flight.
    #[error("client closed")]
    ClientClosed,

    /// The connection to the agent was lost while the request was in flight.
    #[error("connection to {target} lost")]
    ConnectionLost { target: SocketAddr },

    /// The operation was cancelled via its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The pending-request table is full; the request was not sent.
    #[error("too many in-flight requests (limit {limit})")]
    TooManyInflight { limit: usize },

    /// A walk was aborted because the agent returned non-increasing OIDs.
    #[error("walk aborted for {target}: agent returned non-increasing OID {oid}")]
    NonMonotonicWalk { target: SocketAddr, oid: Oid },

    /// No healthy connection was available in the pool.
    #[error("no healthy connections available")]
    NoHealthyConnections,

    /// GETBULK was requested on an SNMPv1 client.
    #[error("GETBULK requires SNMPv2c or later")]
    BulkUnsupported,

    /// An operation was invoked with an empty OID/varbind list.
    #[error("request requires at least one varbind")]
    EmptyRequest,

    /// A SET request carried an exception value (response-only markers).
    #[error("exception value is not valid in a SET request (oid {oid})")]
    InvalidSetValue { oid: Oid },

    /// SNMPv3 authentication failure.
    #[error("authentication failure for {target}")]
    AuthFailure { target: SocketAddr },

    /// SNMPv3 privacy (decryption) failure.
    #[error("privacy failure for {target}")]
    PrivFailure { target: SocketAddr },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),
}

fn fmt_target(target: &Option<SocketAddr>) -> String {
    match target {
        Some(addr) => format!(" for {}", addr),
        None => String::new(),
    }
}

impl Error {
    /// Construct a decode error at the given offset.
    pub(crate) fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Error::Decode { offset, kind }
    }

    /// Construct an invalid-OID error.
    pub(crate) fn invalid_oid(msg: impl Into<String>) -> Self {
        Error::InvalidOid(msg.into().into_boxed_str())
    }

    /// Construct an I/O error for a known target.
    pub(crate) fn io(target: SocketAddr, source: std::io::Error) -> Self {
        Error::Io {
            target: Some(target),
            source,
        }
    }

    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Io { .. } | Error::ConnectionLost { .. }
        )
    }
}

/// Detailed BER decode failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Input ended before the structure was complete.
    TruncatedData,
    /// Indefinite-length encoding (0x80), which SNMP forbids.
    IndefiniteLength,
    /// Long-form length with zero length octets.
    InvalidLength,
    /// Length field with more octets than this library accepts.
    LengthTooLong { octets: usize },
    /// Length value exceeds the message size bound.
    LengthExceedsMax { length: usize, max: usize },
    /// A tag other than the expected one was found.
    UnexpectedTag { expected: u8, actual: u8 },
    /// INTEGER with zero-length content.
    ZeroLengthInteger,
    /// Counter64 content longer than 9 octets.
    Integer64TooLong { length: usize },
    /// NULL with non-zero length.
    InvalidNull,
    /// IpAddress content that is not exactly 4 octets.
    InvalidIpAddressLength { length: usize },
    /// OID with more subidentifiers than RFC 2578 permits.
    OidTooLong { count: usize, max: usize },
    /// Subidentifier overflowed a u32.
    SubidentifierOverflow,
    /// Unknown PDU tag in the message envelope.
    UnknownPduType(u8),
    /// Unknown version number in the message envelope.
    UnknownVersion(i32),
    /// A TLV claimed more content than the buffer holds.
    TlvOverflow,
    /// The response PDU contained no varbinds where one was required.
    EmptyResponse,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedData => write!(f, "unexpected end of input"),
            Self::IndefiniteLength => write!(f, "indefinite length not allowed"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::LengthTooLong { octets } => {
                write!(f, "length field uses {} octets (max 4)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, found 0x{:02X}", expected, actual)
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::Integer64TooLong { length } => {
                write!(f, "Counter64 content of {} octets (max 9)", length)
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IpAddress of {} octets (must be 4)", length)
            }
            Self::OidTooLong { count, max } => {
                write!(f, "OID with {} subidentifiers (max {})", count, max)
            }
            Self::SubidentifierOverflow => write!(f, "OID subidentifier overflows u32"),
            Self::UnknownPduType(tag) => write!(f, "unknown PDU tag 0x{:02X}", tag),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version {}", v),
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::EmptyResponse => write!(f, "response contained no varbinds"),
        }
    }
}

/// SNMP protocol error status codes (RFC 3416).
///
/// Returned by agents in the `error-status` PDU field. Codes 0-5 exist
/// since SNMPv1; 6-18 were added by SNMPv2 for finer SET diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    /// Operation completed successfully (0).
    NoError,
    /// Response would not fit in a single message (1).
    TooBig,
    /// Requested OID not found (2). SNMPv1 only; v2c+ uses exception values.
    NoSuchName,
    /// Invalid value in a SET request (3).
    BadValue,
    /// SET attempted on a read-only object (4).
    ReadOnly,
    /// Unspecified error (5).
    GenErr,
    /// Access denied (6).
    NoAccess,
    /// SET value has the wrong ASN.1 type (7).
    WrongType,
    /// SET value has the wrong length (8).
    WrongLength,
    /// SET value uses the wrong encoding (9).
    WrongEncoding,
    /// SET value out of range (10).
    WrongValue,
    /// Row creation not supported (11).
    NoCreation,
    /// Value inconsistent with other objects (12).
    InconsistentValue,
    /// Resource needed for the SET is unavailable (13).
    ResourceUnavailable,
    /// SET commit phase failed (14).
    CommitFailed,
    /// SET undo phase failed (15).
    UndoFailed,
    /// Access denied by the access control model (16).
    AuthorizationError,
    /// Object does not support modification (17).
    NotWritable,
    /// Named object cannot be created (18).
    InconsistentName,
    /// Unknown or future status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from the raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}
