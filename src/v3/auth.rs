//! USM key derivation and HMAC authentication (RFC 3414, RFC 7860).
//!
//! - password to master key: hash of the password repeated to 1 MiB
//! - localization: `H(Ku || engineID || Ku)`
//! - key extension for privacy protocols that need more key material
//! - HMAC over the whole message with the auth field zeroed

use digest::Digest;
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, KeyExtension};

/// net-snmp refuses shorter passwords (USM_PASSWORDTOOSHORT).
pub const MIN_PASSWORD_LENGTH: usize = 8;

const EXPANSION_SIZE: usize = 1_048_576;

/// Password-derived key before it is bound to an engine (Ku).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl MasterKey {
    /// Run the 1 MiB password expansion. Costly; do it once per credential.
    pub fn from_password(protocol: AuthProtocol, password: &[u8]) -> Self {
        if password.len() < MIN_PASSWORD_LENGTH {
            tracing::warn!(
                target: "snmp_credcheck::auth",
                password_len = password.len(),
                min_len = MIN_PASSWORD_LENGTH,
                "SNMPv3 password is shorter than 8 characters; most agents reject it"
            );
        }
        Self {
            key: password_to_key(protocol, password),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Bind to `engine_id`.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedKey {
        LocalizedKey {
            key: localize_key(self.protocol, &self.key, engine_id),
            protocol: self.protocol,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Key bound to one authoritative engine (Kul).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive and localize in one step.
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        MasterKey::from_password(protocol, password).localize(engine_id)
    }

    /// Wrap an already localized key.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Truncated HMAC of `data`.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        compute_hmac(self.protocol, &self.key, data)
    }

    /// Constant-time comparison against `expected`.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        computed.len() == expected.len() && bool::from(computed.ct_eq(expected))
    }

    /// Key material of at least `len` bytes for a privacy protocol.
    ///
    /// Returns `None` when the digest is too short and `extension` is
    /// [`KeyExtension::None`].
    pub fn extended(&self, len: usize, extension: KeyExtension, engine_id: &[u8]) -> Option<Vec<u8>> {
        let mut key = self.key.clone();
        if key.len() >= len {
            key.truncate(len);
            return Some(key);
        }
        match extension {
            KeyExtension::None => {
                key.zeroize();
                return None;
            }
            KeyExtension::Blumenthal => {
                while key.len() < len {
                    let next = hash(self.protocol, &[&key]);
                    key.extend_from_slice(&next);
                }
            }
            KeyExtension::Reeder => {
                let mut last = self.key.clone();
                while key.len() < len {
                    let next = LocalizedKey::from_password(self.protocol, &last, engine_id);
                    key.extend_from_slice(next.as_bytes());
                    last.zeroize();
                    last = next.as_bytes().to_vec();
                }
                last.zeroize();
            }
        }
        key.truncate(len);
        Some(key)
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => password_to_key_impl::<md5::Md5>(password),
        AuthProtocol::Sha1 => password_to_key_impl::<sha1::Sha1>(password),
        AuthProtocol::Sha224 => password_to_key_impl::<sha2::Sha224>(password),
        AuthProtocol::Sha256 => password_to_key_impl::<sha2::Sha256>(password),
        AuthProtocol::Sha384 => password_to_key_impl::<sha2::Sha384>(password),
        AuthProtocol::Sha512 => password_to_key_impl::<sha2::Sha512>(password),
    }
}

// RFC 3414 A.2.1, hashed in 64-byte chunks like net-snmp
fn password_to_key_impl<D: Digest>(password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![0u8; <D as Digest>::output_size()];
    }

    let mut hasher = D::new();
    let mut chunk = [0u8; 64];
    let mut source = password.iter().cycle();
    for _ in 0..EXPANSION_SIZE / chunk.len() {
        for byte in chunk.iter_mut() {
            // cycle over a non-empty slice never ends
            *byte = source.next().copied().unwrap_or_default();
        }
        hasher.update(chunk);
    }
    chunk.zeroize();
    hasher.finalize().to_vec()
}

fn localize_key(protocol: AuthProtocol, master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    hash(protocol, &[master_key, engine_id, master_key])
}

fn hash(protocol: AuthProtocol, parts: &[&[u8]]) -> Vec<u8> {
    fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = D::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }
    match protocol {
        AuthProtocol::Md5 => run::<md5::Md5>(parts),
        AuthProtocol::Sha1 => run::<sha1::Sha1>(parts),
        AuthProtocol::Sha224 => run::<sha2::Sha224>(parts),
        AuthProtocol::Sha256 => run::<sha2::Sha256>(parts),
        AuthProtocol::Sha384 => run::<sha2::Sha384>(parts),
        AuthProtocol::Sha512 => run::<sha2::Sha512>(parts),
    }
}

macro_rules! truncated_hmac {
    ($digest:ty, $key:expr, $data:expr, $len:expr) => {{
        let mut mac = <Hmac<$digest> as Mac>::new_from_slice($key)
            .expect("HMAC accepts keys of any length");
        mac.update($data);
        mac.finalize().into_bytes()[..$len].to_vec()
    }};
}

fn compute_hmac(protocol: AuthProtocol, key: &[u8], data: &[u8]) -> Vec<u8> {
    let len = protocol.mac_len();
    match protocol {
        AuthProtocol::Md5 => truncated_hmac!(md5::Md5, key, data, len),
        AuthProtocol::Sha1 => truncated_hmac!(sha1::Sha1, key, data, len),
        AuthProtocol::Sha224 => truncated_hmac!(sha2::Sha224, key, data, len),
        AuthProtocol::Sha256 => truncated_hmac!(sha2::Sha256, key, data, len),
        AuthProtocol::Sha384 => truncated_hmac!(sha2::Sha384, key, data, len),
        AuthProtocol::Sha512 => truncated_hmac!(sha2::Sha512, key, data, len),
    }
}

/// Write the HMAC of `message` into its zeroed auth placeholder at `offset`.
pub fn authenticate_message(key: &LocalizedKey, message: &mut [u8], offset: usize) {
    let mac = key.compute_hmac(message);
    message[offset..offset + mac.len()].copy_from_slice(&mac);
}

/// Check the HMAC carried at `offset..offset + len`.
///
/// Returns `false` when the field does not fit the message or has the wrong
/// length for the key's protocol.
pub fn verify_message(key: &LocalizedKey, message: &[u8], offset: usize, len: usize) -> bool {
    if len != key.mac_len() || offset.saturating_add(len) > message.len() {
        return false;
    }
    let received = &message[offset..offset + len];
    let mut zeroed = message.to_vec();
    zeroed[offset..offset + len].fill(0);
    key.verify_hmac(&zeroed, received)
}
