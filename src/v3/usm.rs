//! USM security parameters (RFC 3414 2.4).
//!
//! Carried as an OCTET STRING wrapping:
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::error::internal::DecodeFault;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    /// Truncated HMAC, or empty below authNoPriv.
    pub auth_params: Bytes,
    /// Salt, or empty below authPriv.
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// All-empty parameters used by engine discovery.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Zeroed auth field of `mac_len` bytes, overwritten once the message
    /// is encoded.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.engine_id.len() + self.username.len());
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode the contents of msgSecurityParameters.
    pub fn decode(data: Bytes, target: SocketAddr) -> Result<Self> {
        let mut decoder = Decoder::with_target(data, target);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;
        let engine_boots = read_engine_value(&mut seq)?;
        let engine_time = read_engine_value(&mut seq)?;
        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate msgAuthenticationParameters inside an encoded v3 message.
    ///
    /// Returns `(offset, length)` of the field content.
    pub fn find_auth_params_offset(message: &[u8]) -> Option<(usize, usize)> {
        let mut dec = Decoder::from_slice(message);
        // outer SEQUENCE, then version and msgGlobalData
        dec.expect_tag(tag::universal::SEQUENCE).ok()?;
        dec.skip_tlv().ok()?;
        dec.skip_tlv().ok()?;
        // msgSecurityParameters wrapping the USM SEQUENCE
        dec.expect_tag(tag::universal::OCTET_STRING).ok()?;
        dec.expect_tag(tag::universal::SEQUENCE).ok()?;
        // engine ID, boots, time, user name
        for _ in 0..4 {
            dec.skip_tlv().ok()?;
        }
        let len = dec.expect_tag(tag::universal::OCTET_STRING).ok()?;
        let offset = dec.offset();
        (offset + len <= message.len()).then_some((offset, len))
    }
}

// RFC 3414: INTEGER (0..2147483647)
fn read_engine_value(seq: &mut Decoder) -> Result<u32> {
    let raw = seq.read_integer()?;
    u32::try_from(raw).map_err(|_| seq.fault(DecodeFault::NegativeEngineValue))
}
