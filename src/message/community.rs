//! SNMPv2c message: `SEQUENCE { version, community, pdu }`.

use bytes::Bytes;

use super::Version;
use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::pdu::Pdu;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityMessage {
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            community: community.into(),
            pdu,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.community.len());
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(Version::V2c.as_i32());
        });
        buf.finish()
    }

    /// Decode the fields after the version number.
    pub(crate) fn decode_body(seq: &mut Decoder) -> Result<Self> {
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;
        Ok(Self { community, pdu })
    }

    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}
