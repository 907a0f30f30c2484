//! Decode and crypto failure kinds.
//!
//! Only ever rendered into log fields; the public [`Error`](super::Error)
//! stays coarse.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeFault {
    UnexpectedTag { expected: u8, actual: u8 },
    TruncatedData,
    IndefiniteLength,
    LengthTooLong { octets: usize },
    LengthExceedsMax { length: usize, max: usize },
    ZeroLengthInteger,
    Integer64TooLong { length: usize },
    InvalidNull,
    InvalidOidEncoding,
    UnknownVersion(i32),
    UnknownPduType(u8),
    UnknownSecurityModel(i32),
    InvalidMsgFlags,
    MsgMaxSizeTooSmall { value: i32 },
    NegativeEngineValue,
    InvalidIpAddressLength { length: usize },
    TrailingData,
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => f.write_str("unexpected end of data"),
            Self::IndefiniteLength => f.write_str("indefinite length not supported"),
            Self::LengthTooLong { octets } => write!(f, "length field uses {} octets", octets),
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::ZeroLengthInteger => f.write_str("zero-length integer"),
            Self::Integer64TooLong { length } => write!(f, "integer64 of {} bytes", length),
            Self::InvalidNull => f.write_str("NULL with content"),
            Self::InvalidOidEncoding => f.write_str("invalid OID encoding"),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type 0x{:02X}", t),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model {}", m),
            Self::InvalidMsgFlags => f.write_str("privacy flag without authentication flag"),
            Self::MsgMaxSizeTooSmall { value } => write!(f, "msgMaxSize {} below 484", value),
            Self::NegativeEngineValue => f.write_str("negative engine boots or time"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IpAddress of {} bytes", length)
            }
            Self::TrailingData => f.write_str("trailing data after message"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoFault {
    InvalidPrivParamsLength { expected: usize, actual: usize },
    InvalidCiphertextLength { length: usize, block: usize },
    CipherInit,
    ShortKey { needed: usize, actual: usize },
}

impl fmt::Display for CryptoFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(f, "privParameters of {} bytes, expected {}", actual, expected)
            }
            Self::InvalidCiphertextLength { length, block } => {
                write!(f, "ciphertext of {} bytes is not a multiple of {}", length, block)
            }
            Self::CipherInit => f.write_str("cipher initialisation failed"),
            Self::ShortKey { needed, actual } => {
                write!(f, "privacy key of {} bytes, need {}", actual, needed)
            }
        }
    }
}
