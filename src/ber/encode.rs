//! Back-to-front BER encoder.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Buffer that grows towards the front of the message.
///
/// Callers push fields in reverse order: the last field of a SEQUENCE
/// first, then the one before it. Closures passed to
/// [`push_sequence`](Self::push_sequence) write the content, after which the
/// length and tag are prepended.
///
/// ```
/// use snmp_credcheck::ber::EncodeBuf;
///
/// let mut buf = EncodeBuf::new();
/// buf.push_sequence(|buf| {
///     buf.push_integer(2);
///     buf.push_integer(1);
/// });
/// assert_eq!(&buf.finish()[..], &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
/// ```
#[derive(Debug, Default)]
pub struct EncodeBuf {
    // stored reversed; `finish` flips it
    rev: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rev: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.rev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rev.is_empty()
    }

    /// Prepend raw bytes.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.rev.extend(data.iter().rev());
    }

    pub fn push_byte(&mut self, byte: u8) {
        self.rev.push(byte);
    }

    /// Prepend a length header.
    pub fn push_length(&mut self, len: usize) {
        let (buf, n) = encode_length(len);
        self.rev.extend_from_slice(&buf[..n]);
    }

    /// Prepend a complete TLV with the given tag and content.
    pub fn push_tlv(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_byte(tag);
    }

    /// Prepend a constructed value whose content is written by `f`.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.len();
        f(self);
        let content_len = self.len() - start;
        self.push_length(content_len);
        self.push_byte(tag);
    }

    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    pub fn push_integer(&mut self, value: i32) {
        self.push_integer64_signed(tag::universal::INTEGER, value as i64);
    }

    /// Prepend an unsigned application integer (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        self.push_integer64_signed(tag, value as i64);
    }

    pub fn push_counter64(&mut self, value: u64) {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
        let content = &bytes[skip..];
        if content[0] & 0x80 != 0 {
            self.push_bytes(content);
            self.push_byte(0x00);
            self.push_length(content.len() + 1);
        } else {
            self.push_bytes(content);
            self.push_length(content.len());
        }
        self.push_byte(tag::application::COUNTER64);
    }

    // minimal two's complement
    fn push_integer64_signed(&mut self, tag: u8, value: i64) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 7 {
            let b = bytes[start];
            let next_high = bytes[start + 1] & 0x80;
            if (b == 0x00 && next_high == 0) || (b == 0xFF && next_high != 0) {
                start += 1;
            } else {
                break;
            }
        }
        self.push_tlv(tag, &bytes[start..]);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_tlv(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_byte(0x00);
        self.push_byte(tag::universal::NULL);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_tlv(tag::universal::OBJECT_IDENTIFIER, &oid.to_ber());
    }

    /// Consume the buffer and return the encoded message in wire order.
    pub fn finish(mut self) -> Bytes {
        self.rev.reverse();
        Bytes::from(self.rev)
    }
}
