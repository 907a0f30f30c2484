//! SNMP message envelopes.
//!
//! - [`CommunityMessage`]: v2c, authenticated by community string only
//! - [`V3Message`]: v3 with USM security parameters

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MsgFlags, MsgGlobalData, ParseSecurityLevelError, ScopedPdu, SecurityLevel, SecurityModel,
    V3Message, V3MessageData,
};
pub(crate) use v3::MAX_UDP_PAYLOAD;

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::Result;
use crate::error::internal::DecodeFault;

/// Message-processing model number carried in the version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Version {
    V2c = 1,
    V3 = 3,
}

impl Version {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::V2c),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Any message a manager can receive.
#[derive(Debug)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    /// Decode a datagram, dispatching on the version field.
    pub fn decode(data: Bytes, target: SocketAddr) -> Result<Self> {
        let mut decoder = Decoder::with_target(data, target);
        let mut seq = decoder.read_sequence()?;
        let raw = seq.read_integer()?;
        let message = match Version::from_i32(raw) {
            Some(Version::V2c) => Message::Community(CommunityMessage::decode_body(&mut seq)?),
            Some(Version::V3) => Message::V3(V3Message::decode_body(&mut seq)?),
            None => return Err(seq.fault(DecodeFault::UnknownVersion(raw))),
        };
        if !decoder.is_empty() {
            return Err(decoder.fault(DecodeFault::TrailingData));
        }
        Ok(message)
    }

    pub fn version(&self) -> Version {
        match self {
            Message::Community(_) => Version::V2c,
            Message::V3(_) => Version::V3,
        }
    }
}
