//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData { msgID, msgMaxSize, msgFlags, msgSecurityModel }
//!     OCTET STRING msgSecurityParameters (USM, see crate::v3::usm)
//!     msgData: ScopedPDU, or OCTET STRING holding an encrypted ScopedPDU
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use super::Version;
use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::error::internal::DecodeFault;
use crate::pdu::Pdu;
use crate::v3::UsmSecurityParams;

/// Largest UDP payload; advertised as msgMaxSize.
pub(crate) const MAX_UDP_PAYLOAD: i32 = 65507;

const MSG_MAX_SIZE_MINIMUM: i32 = 484;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    Usm = 3,
}

/// SNMPv3 security level, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityLevel {
    #[default]
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Level encoded in the low bits of msgFlags. Privacy without
    /// authentication is not a level.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & 0x01 != 0, flags & 0x02 != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoAuthNoPriv => "noAuthNoPriv",
            Self::AuthNoPriv => "authNoPriv",
            Self::AuthPriv => "authPriv",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSecurityLevelError(String);

impl fmt::Display for ParseSecurityLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown security level '{}'; expected noAuthNoPriv, authNoPriv or authPriv",
            self.0
        )
    }
}

impl std::error::Error for ParseSecurityLevelError {}

impl FromStr for SecurityLevel {
    type Err = ParseSecurityLevelError;

    /// Case-insensitive; `_` and `-` are ignored so `AUTH_PRIV` and
    /// `auth-priv` both work.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "noauthnopriv" | "noauth" => Ok(Self::NoAuthNoPriv),
            "authnopriv" | "auth" => Ok(Self::AuthNoPriv),
            "authpriv" | "priv" => Ok(Self::AuthPriv),
            _ => Err(ParseSecurityLevelError(s.to_string())),
        }
    }
}

impl serde::Serialize for SecurityLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for SecurityLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// msgFlags (RFC 3412 6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    /// The receiver may answer with a Report PDU.
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn to_byte(self) -> u8 {
        self.security_level.to_flags() | if self.reportable { 0x04 } else { 0 }
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model as i32);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(seq.fault(DecodeFault::MsgMaxSizeTooSmall {
                value: msg_max_size,
            }));
        }

        let flags = seq.read_octet_string()?;
        let security_level = match flags.as_ref() {
            [byte] => SecurityLevel::from_flags(*byte),
            _ => None,
        }
        .ok_or_else(|| seq.fault(DecodeFault::InvalidMsgFlags))?;
        let reportable = flags[0] & 0x04 != 0;

        let model = seq.read_integer()?;
        if model != SecurityModel::Usm as i32 {
            return Err(seq.fault(DecodeFault::UnknownSecurityModel(model)));
        }

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags: MsgFlags::new(security_level, reportable),
            msg_security_model: SecurityModel::Usm,
        })
    }
}

/// contextEngineID + contextName + PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    pub fn with_empty_context(pdu: Pdu) -> Self {
        Self::new(Bytes::new(), Bytes::new(), pdu)
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Standalone encoding, the plaintext that privacy protocols encrypt.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Encoded [`UsmSecurityParams`], kept opaque until the USM layer reads it.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    /// Ciphertext of an encoded ScopedPDU.
    Encrypted(Bytes),
}

impl V3Message {
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    pub fn new_encrypted(global_data: MsgGlobalData, security_params: Bytes, encrypted: Bytes) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(encrypted),
        }
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Encode to BER.
    ///
    /// Authenticated messages are encoded with a zeroed auth placeholder;
    /// the HMAC is patched in afterwards.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(256);
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(Version::V3.as_i32());
        });
        buf.finish()
    }

    /// Decode the fields after the version number.
    pub(crate) fn decode_body(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;
        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };
        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }

    /// Engine discovery probe (RFC 3414 4): reportable noAuthNoPriv GET
    /// with an empty engine ID, user and varbind list.
    pub fn discovery_request(msg_id: i32) -> Self {
        let global_data = MsgGlobalData::new(
            msg_id,
            MAX_UDP_PAYLOAD,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        );
        let scoped = ScopedPdu::with_empty_context(Pdu::get_request(msg_id, &[]));
        Self::new(global_data, UsmSecurityParams::empty().encode(), scoped)
    }
}
