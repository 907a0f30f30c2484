//! Error types for the SNMP engine layer.
//!
//! These errors never reach callers of [`CredentialValidator`](crate::CredentialValidator)
//! directly. The engine adapter turns them into an
//! [`EngineSignal`](crate::EngineSignal), which the classifier maps to a
//! [`ValidationResult`](crate::ValidationResult).
//!
//! Errors are boxed: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use snmp_credcheck::{Error, Result};
//!
//! fn describe(result: Result<()>) -> String {
//!     match result {
//!         Ok(()) => "ok".into(),
//!         Err(e) => match &*e {
//!             Error::Timeout { target, .. } => format!("{target} did not answer"),
//!             Error::Report { kind, .. } => format!("agent rejected request: {kind}"),
//!             other => other.to_string(),
//!         },
//!     }
//! }
//! ```

pub(crate) mod internal;

use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;
use crate::v3::ReportKind;

/// Placeholder address for errors raised before a target is known.
pub(crate) const UNKNOWN_TARGET: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

// Decode failures log the detailed kind and surface a generic error:
//
// tracing::debug!(
//     target: "snmp_credcheck::ber",
//     { snmp.offset = 42, kind = %DecodeFault::ZeroLengthInteger },
//     "zero-length integer"
// );
// return Err(Error::MalformedResponse { target }.boxed());

/// Result type alias using the crate's boxed error.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Failure of a single SNMP exchange.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket-level failure (connection refused, network unreachable, ...).
    #[error("network error communicating with {target}: {source}")]
    Network {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Host name could not be resolved to an address.
    #[error("cannot resolve {host}: {reason}")]
    Resolve { host: Box<str>, reason: Box<str> },

    /// No datagram of any kind came back within the budget.
    #[error("timeout after {elapsed:?} waiting for {target} ({retries} retries)")]
    Timeout {
        target: SocketAddr,
        elapsed: Duration,
        retries: u32,
    },

    /// The agent answered a liveness probe but never answered the request.
    #[error("{target} is alive but discarded the request after {elapsed:?}")]
    SilentDrop {
        target: SocketAddr,
        elapsed: Duration,
    },

    /// The agent answered with a non-zero error-status.
    #[error("SNMP error from {target}: {status} at index {index}")]
    Snmp {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// The agent answered with a USM report PDU.
    #[error("{target} sent report: {kind}")]
    Report { target: SocketAddr, kind: ReportKind },

    /// A response failed HMAC verification.
    #[error("authentication failed for response from {target}")]
    Auth { target: SocketAddr },

    /// A response could not be decrypted.
    #[error("decryption failed for response from {target}")]
    Decrypt { target: SocketAddr },

    /// Response did not decode.
    #[error("malformed response from {target}")]
    MalformedResponse { target: SocketAddr },

    /// Invalid local configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID text.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),
}

impl Error {
    /// Box this error.
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }
}

/// SNMP error-status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    /// Access denied by the view-based access control model.
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Code outside RFC 3416.
    Unknown(i32),
}

const STATUS_NAMES: [(ErrorStatus, &str); 19] = [
    (ErrorStatus::NoError, "noError"),
    (ErrorStatus::TooBig, "tooBig"),
    (ErrorStatus::NoSuchName, "noSuchName"),
    (ErrorStatus::BadValue, "badValue"),
    (ErrorStatus::ReadOnly, "readOnly"),
    (ErrorStatus::GenErr, "genErr"),
    (ErrorStatus::NoAccess, "noAccess"),
    (ErrorStatus::WrongType, "wrongType"),
    (ErrorStatus::WrongLength, "wrongLength"),
    (ErrorStatus::WrongEncoding, "wrongEncoding"),
    (ErrorStatus::WrongValue, "wrongValue"),
    (ErrorStatus::NoCreation, "noCreation"),
    (ErrorStatus::InconsistentValue, "inconsistentValue"),
    (ErrorStatus::ResourceUnavailable, "resourceUnavailable"),
    (ErrorStatus::CommitFailed, "commitFailed"),
    (ErrorStatus::UndoFailed, "undoFailed"),
    (ErrorStatus::AuthorizationError, "authorizationError"),
    (ErrorStatus::NotWritable, "notWritable"),
    (ErrorStatus::InconsistentName, "inconsistentName"),
];

impl ErrorStatus {
    /// Create from the raw code carried in a PDU.
    pub fn from_i32(value: i32) -> Self {
        match usize::try_from(value).ok().and_then(|i| STATUS_NAMES.get(i)) {
            Some((status, _)) => *status,
            None => {
                tracing::warn!(target: "snmp_credcheck::error", { snmp.error_status = value }, "unknown SNMP error status");
                Self::Unknown(value)
            }
        }
    }

    /// Raw code for the wire.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Unknown(code) => *code,
            known => STATUS_NAMES
                .iter()
                .position(|(s, _)| s == known)
                .map_or(-1, |i| i as i32),
        }
    }

    /// True for statuses that mean the credentials were not granted access.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::NoAccess | Self::AuthorizationError)
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({})", code),
            known => {
                let name = STATUS_NAMES
                    .iter()
                    .find(|(s, _)| s == known)
                    .map_or("unknown", |(_, n)| n);
                f.write_str(name)
            }
        }
    }
}
