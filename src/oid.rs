//! Object identifiers.
//!
//! Arcs live in a `SmallVec<[u32; 16]>`, so the OIDs a credential check
//! touches never allocate.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// RFC 2578 3.5 limit on sub-identifiers.
pub const MAX_OID_LEN: usize = 128;

/// `sysDescr.0`, queried when no OID is configured.
pub const SYS_DESCR: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 1, 0];

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation. A single leading dot is accepted
    /// (`.1.3.6.1` as printed by net-snmp); empty arcs elsewhere are not.
    ///
    /// Symbolic names for the system group are accepted too, with an
    /// optional instance suffix:
    ///
    /// ```
    /// use snmp_credcheck::oid::Oid;
    ///
    /// assert_eq!(Oid::parse(".1.3.6.1.2.1.1.5.0").unwrap().to_string(), "1.3.6.1.2.1.1.5.0");
    /// assert_eq!(Oid::parse("sysName.0").unwrap().to_string(), "1.3.6.1.2.1.1.5.0");
    /// assert!(Oid::parse("1..3").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidOid(s.into()).boxed();
        let text = s.trim();
        let text = text.strip_prefix('.').unwrap_or(text);
        if text.is_empty() {
            return Err(invalid());
        }

        let (head, tail) = match text.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (text, None),
        };
        let mut arcs: SmallVec<[u32; 16]> = match well_known(head) {
            Some(prefix) => SmallVec::from_slice(prefix),
            None => SmallVec::from_slice(&[head.parse::<u32>().map_err(|_| invalid())?]),
        };
        if let Some(tail) = tail {
            for part in tail.split('.') {
                arcs.push(part.parse().map_err(|_| invalid())?);
            }
        }

        let oid = Self { arcs };
        oid.validate().map_err(|_| invalid())?;
        Ok(oid)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// Check X.690 8.19.4 arc constraints and the RFC 2578 length limit.
    pub fn validate(&self) -> Result<()> {
        let bad = |why: &str| Err(Error::InvalidOid(format!("{}: {}", self, why).into()).boxed());
        match self.arcs.as_slice() {
            [] | [_] => bad("needs at least two arcs"),
            [first, ..] if *first > 2 => bad("first arc must be 0, 1 or 2"),
            [first, second, ..] if *first < 2 && *second >= 40 => {
                bad("second arc must be below 40")
            }
            [_, second, ..] if *second > u32::MAX - 80 => bad("second arc too large"),
            arcs if arcs.len() > MAX_OID_LEN => bad("too many arcs"),
            _ => Ok(()),
        }
    }

    /// BER content octets (X.690 8.19).
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut out = SmallVec::new();
        match self.arcs.as_slice() {
            [] => {}
            [only] => push_subid(&mut out, only * 40),
            [first, second, rest @ ..] => {
                push_subid(&mut out, first * 40 + second);
                for &arc in rest {
                    push_subid(&mut out, arc);
                }
            }
        }
        out
    }

    /// Decode BER content octets.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        let invalid = || Error::InvalidOid("bad BER encoding".into()).boxed();
        let mut arcs = SmallVec::new();
        let mut pos = 0;
        let mut first = true;

        while pos < data.len() {
            let mut value: u32 = 0;
            loop {
                let byte = *data.get(pos).ok_or_else(invalid)?;
                pos += 1;
                if value > (u32::MAX >> 7) {
                    return Err(invalid());
                }
                value = (value << 7) | (byte & 0x7F) as u32;
                if byte & 0x80 == 0 {
                    break;
                }
            }
            if first {
                let (a, b) = match value {
                    0..40 => (0, value),
                    40..80 => (1, value - 40),
                    _ => (2, value - 80),
                };
                arcs.push(a);
                arcs.push(b);
                first = false;
            } else {
                arcs.push(value);
            }
            if arcs.len() > MAX_OID_LEN {
                return Err(invalid());
            }
        }
        Ok(Self { arcs })
    }
}

fn push_subid(out: &mut SmallVec<[u8; 64]>, value: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut rest = value;
    loop {
        groups[n] = (rest & 0x7F) as u8;
        rest >>= 7;
        n += 1;
        if rest == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

/// Symbolic names of the MIB-2 system group.
fn well_known(name: &str) -> Option<&'static [u32]> {
    const SYSTEM: &[(&str, &[u32])] = &[
        ("sysDescr", &[1, 3, 6, 1, 2, 1, 1, 1]),
        ("sysObjectID", &[1, 3, 6, 1, 2, 1, 1, 2]),
        ("sysUpTime", &[1, 3, 6, 1, 2, 1, 1, 3]),
        ("sysContact", &[1, 3, 6, 1, 2, 1, 1, 4]),
        ("sysName", &[1, 3, 6, 1, 2, 1, 1, 5]),
        ("sysLocation", &[1, 3, 6, 1, 2, 1, 1, 6]),
    ];
    SYSTEM
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, arcs)| *arcs)
}

impl Default for Oid {
    fn default() -> Self {
        Self::from_slice(&SYS_DESCR)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.arcs.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
            for arc in arcs {
                write!(f, ".{}", arc)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

impl serde::Serialize for Oid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Oid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Oid::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Build an [`Oid`] from literal arcs.
///
/// ```
/// use snmp_credcheck::oid;
///
/// assert_eq!(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0).to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
