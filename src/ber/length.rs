//! BER definite-length encoding (X.690 8.1.3).
//!
//! Indefinite lengths (0x80) are rejected; SNMP never uses them.

use crate::error::internal::DecodeFault;

/// Largest content length accepted while decoding.
///
/// Real SNMP messages are well under 64 KiB; 2 MiB leaves headroom while
/// still refusing absurd length fields.
pub const MAX_LENGTH: usize = 0x20_0000;

/// Encode a length, least significant byte first.
///
/// The reversed order suits [`EncodeBuf`](super::EncodeBuf), which builds
/// messages back to front.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];
    if len <= 0x7F {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut n = 0;
    let mut rest = len;
    while rest > 0 {
        buf[n] = rest as u8;
        rest >>= 8;
        n += 1;
    }
    buf[n] = 0x80 | n as u8;
    (buf, n + 1)
}

/// Decode a length, returning `(length, octets consumed)`.
pub(crate) fn decode_length(data: &[u8]) -> Result<(usize, usize), DecodeFault> {
    let first = *data.first().ok_or(DecodeFault::TruncatedData)?;

    if first == 0x80 {
        return Err(DecodeFault::IndefiniteLength);
    }
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets > 4 {
        return Err(DecodeFault::LengthTooLong { octets });
    }
    let bytes = data.get(1..1 + octets).ok_or(DecodeFault::TruncatedData)?;
    let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);

    if len > MAX_LENGTH {
        return Err(DecodeFault::LengthExceedsMax {
            length: len,
            max: MAX_LENGTH,
        });
    }
    Ok((len, 1 + octets))
}
