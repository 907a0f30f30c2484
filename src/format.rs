//! Hex helpers for engine IDs, keys and opaque values.

use std::fmt;

/// Lowercase hex.
///
/// ```
/// use snmp_credcheck::format::hex;
///
/// assert_eq!(hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
/// ```
pub fn hex(bytes: &[u8]) -> String {
    Hex(bytes).to_string()
}

/// Parse hex text, ignoring `:`, spaces and an optional `0x` prefix.
///
/// ```
/// use snmp_credcheck::format::unhex;
///
/// assert_eq!(unhex("0x80:00:1F").unwrap(), vec![0x80, 0x00, 0x1f]);
/// assert!(unhex("abc").is_none());
/// ```
pub fn unhex(text: &str) -> Option<Vec<u8>> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !matches!(b, b':' | b' '))
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Lazy hex rendering for log fields.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
