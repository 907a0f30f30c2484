//! SNMPv3 User-based Security Model (RFC 3414, RFC 3826, RFC 7860).
//!
//! - USM security parameters encoding and decoding
//! - Password to key derivation and key localization
//! - Authentication: HMAC-MD5-96, HMAC-SHA-96, HMAC-SHA-224/256/384/512
//! - Privacy: DES-CBC, 3DES-EDE-CBC, AES-128/192/256-CFB
//! - Engine discovery state and usmStats report recognition

pub mod auth;
mod engine;
mod privacy;
mod usm;

pub use auth::{LocalizedKey, MasterKey, authenticate_message, verify_message};
pub use engine::{EngineState, ReportKind, TIME_WINDOW, report_oid};
pub use privacy::{PrivKey, SaltCounter};
pub use usm::UsmSecurityParams;

use std::fmt;
use std::str::FromStr;

/// How a localized key is lengthened when the privacy protocol needs more
/// key material than the authentication digest provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyExtension {
    /// Truncate only. Fails if the digest is too short.
    #[default]
    None,
    /// draft-blumenthal-aes-usm-04: `Kul || H(Kul) || H(Kul || H(Kul)) ...`.
    /// What net-snmp uses for AES-192/256.
    Blumenthal,
    /// draft-reeder-snmpv3-usm-3desede: append keys localized from the
    /// previous key treated as a password. Mandatory for 3DES; Cisco uses it
    /// for AES-192/256 as well.
    Reeder,
}

impl fmt::Display for KeyExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Blumenthal => "blumenthal",
            Self::Reeder => "reeder",
        })
    }
}

impl FromStr for KeyExtension {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "blumenthal" => Ok(Self::Blumenthal),
            "reeder" | "cisco" => Ok(Self::Reeder),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: ProtocolKind::KeyExtension,
            }),
        }
    }
}

/// Error returned when a protocol name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProtocolError {
    input: String,
    kind: ProtocolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtocolKind {
    Auth,
    Priv,
    KeyExtension,
}

impl fmt::Display for ParseProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProtocolKind::Auth => write!(
                f,
                "unknown authentication protocol '{}'; expected one of: MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512",
                self.input
            ),
            ProtocolKind::Priv => write!(
                f,
                "unknown privacy protocol '{}'; expected one of: DES, 3DES, AES, AES-192, AES-256",
                self.input
            ),
            ProtocolKind::KeyExtension => write!(
                f,
                "unknown key extension '{}'; expected none, blumenthal or reeder",
                self.input
            ),
        }
    }
}

impl std::error::Error for ParseProtocolError {}

/// Normalise a protocol name: uppercase, drop `-`, `_` and the pysnmp
/// `usm`/`Protocol` decorations.
fn fold_name(s: &str) -> String {
    let upper: String = s
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let trimmed = upper.strip_prefix("USM").unwrap_or(&upper);
    let trimmed = trimmed.strip_suffix("PROTOCOL").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("PRIV").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("AUTH").unwrap_or(trimmed);
    trimmed.to_string()
}

/// Authentication protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthProtocol {
    /// HMAC-MD5-96 (RFC 3414)
    Md5,
    /// HMAC-SHA-96 (RFC 3414)
    Sha1,
    /// HMAC-SHA-224 (RFC 7860)
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

impl FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    /// Accepts the net-snmp spellings (`SHA-256`) and the pysnmp
    /// identifiers (`usmHMAC192SHA256AuthProtocol`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_name(s).as_str() {
            "MD5" | "HMACMD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "HMACSHA" => Ok(Self::Sha1),
            "SHA224" | "HMAC128SHA224" => Ok(Self::Sha224),
            "SHA256" | "HMAC192SHA256" => Ok(Self::Sha256),
            "SHA384" | "HMAC256SHA384" => Ok(Self::Sha384),
            "SHA512" | "HMAC384SHA512" => Ok(Self::Sha512),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: ProtocolKind::Auth,
            }),
        }
    }
}

fn is_none_name(s: &str) -> bool {
    matches!(fold_name(s).as_str(), "NONE" | "NO" | "")
}

impl AuthProtocol {
    /// Parse a name that may also be `none` (or `usmNoAuthProtocol`).
    pub fn parse_optional(s: &str) -> Result<Option<Self>, ParseProtocolError> {
        if is_none_name(s) {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    /// Digest length, which is also the localized key length.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Truncated MAC length carried in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }

    /// True when the localized key alone covers the privacy key.
    pub fn is_compatible_with(self, priv_protocol: PrivProtocol) -> bool {
        self.digest_len() >= priv_protocol.key_len()
    }
}

/// Privacy protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivProtocol {
    /// DES-CBC (RFC 3414)
    Des,
    /// 3DES-EDE-CBC (draft-reeder-snmpv3-usm-3desede)
    TripleDes,
    /// AES-128-CFB (RFC 3826)
    Aes128,
    Aes192,
    Aes256,
}

impl fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Des => "DES",
            Self::TripleDes => "3DES",
            Self::Aes128 => "AES",
            Self::Aes192 => "AES-192",
            Self::Aes256 => "AES-256",
        })
    }
}

impl FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_name(s).as_str() {
            "DES" => Ok(Self::Des),
            "3DES" | "3DESEDE" | "TRIPLEDES" | "DES3" => Ok(Self::TripleDes),
            "AES" | "AES128" | "AESCFB128" => Ok(Self::Aes128),
            "AES192" | "AESCFB192" => Ok(Self::Aes192),
            "AES256" | "AESCFB256" => Ok(Self::Aes256),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: ProtocolKind::Priv,
            }),
        }
    }
}

impl PrivProtocol {
    /// Parse a name that may also be `none` (or `usmNoPrivProtocol`).
    pub fn parse_optional(s: &str) -> Result<Option<Self>, ParseProtocolError> {
        if is_none_name(s) {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    /// Key material consumed, including the pre-IV for the CBC ciphers.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des => 16,       // 8 key + 8 pre-IV
            Self::TripleDes => 32, // 24 key + 8 pre-IV
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Length of msgPrivacyParameters.
    pub fn salt_len(self) -> usize {
        8
    }

    /// Cipher block size; ciphertext must be a multiple of it for CBC.
    pub fn block_len(self) -> usize {
        match self {
            Self::Des | Self::TripleDes => 8,
            Self::Aes128 | Self::Aes192 | Self::Aes256 => 16,
        }
    }

    /// Extension used when none is configured.
    pub fn default_key_extension(self) -> KeyExtension {
        match self {
            Self::Des | Self::Aes128 => KeyExtension::None,
            Self::TripleDes => KeyExtension::Reeder,
            Self::Aes192 | Self::Aes256 => KeyExtension::Blumenthal,
        }
    }
}

macro_rules! serde_via_str {
    ($($ty:ty),*) => {$(
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    )*};
}

serde_via_str!(AuthProtocol, PrivProtocol);
