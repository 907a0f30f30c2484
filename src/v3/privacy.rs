//! USM privacy protocols.
//!
//! ## DES-CBC (RFC 3414 8.1) and 3DES-EDE-CBC (draft-reeder)
//! - key material: cipher key followed by an 8-byte pre-IV
//! - privParameters (salt): engineBoots (4) || local counter (4)
//! - IV: pre-IV XOR salt
//!
//! ## AES-CFB (RFC 3826, draft-blumenthal for 192/256)
//! - privParameters (salt): 64-bit local counter
//! - IV: engineBoots (4) || engineTime (4) || salt (8)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, KeyExtension, LocalizedKey, MasterKey, PrivProtocol};
use crate::error::internal::CryptoFault;
use crate::error::{Error, Result};

fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        if getrandom::fill(&mut buf).is_err() {
            tracing::warn!(
                target: "snmp_credcheck::crypto",
                "OS random source unavailable; seeding salt from the clock"
            );
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(1, |d| d.as_nanos() as u64);
            return nanos | 1;
        }
        let value = u64::from_ne_bytes(buf);
        if value != 0 {
            return value;
        }
    }
}

/// Salt source shared by every encryption an engine performs.
///
/// Seeded from the OS random source so restarts do not repeat IVs.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    /// Fixed starting point, for tests.
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt. Zero is skipped on wraparound, like net-snmp.
    pub fn next(&self) -> u64 {
        let value = self.0.fetch_add(1, Ordering::Relaxed);
        if value == 0 {
            self.0.fetch_add(1, Ordering::Relaxed)
        } else {
            value
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Localized privacy key, already extended to the protocol's key length.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Localize `master` to `engine_id` and extend it for `protocol`.
    ///
    /// Fails with [`Error::Config`] when the digest is too short and
    /// `extension` is [`KeyExtension::None`].
    pub fn from_master_key(
        master: &MasterKey,
        protocol: PrivProtocol,
        engine_id: &[u8],
        extension: KeyExtension,
    ) -> Result<Self> {
        Self::from_localized(&master.localize(engine_id), protocol, engine_id, extension)
    }

    pub fn from_localized(
        localized: &LocalizedKey,
        protocol: PrivProtocol,
        engine_id: &[u8],
        extension: KeyExtension,
    ) -> Result<Self> {
        let key = localized
            .extended(protocol.key_len(), extension, engine_id)
            .ok_or_else(|| {
                Error::Config(
                    format!(
                        "{} digest provides {} bytes but {} needs {}; set a key extension",
                        localized.protocol(),
                        localized.protocol().digest_len(),
                        protocol,
                        protocol.key_len()
                    )
                    .into(),
                )
                .boxed()
            })?;
        Ok(Self { key, protocol })
    }

    /// Full derivation from a password. Runs the 1 MiB expansion.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
        extension: KeyExtension,
    ) -> Result<Self> {
        let master = MasterKey::from_password(auth_protocol, password);
        Self::from_master_key(&master, protocol, engine_id, extension)
    }

    /// Wrap raw key material of at least `protocol.key_len()` bytes.
    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// Encrypt an encoded ScopedPDU. Returns `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: &SaltCounter,
    ) -> Result<(Bytes, Bytes)> {
        self.check_key_len(None)?;
        let salt = salt.next();
        match self.protocol {
            PrivProtocol::Des | PrivProtocol::TripleDes => {
                let mut params = [0u8; 8];
                params[..4].copy_from_slice(&engine_boots.to_be_bytes());
                params[4..].copy_from_slice(&(salt as u32).to_be_bytes());
                let ciphertext = self.cbc_encrypt(plaintext, &params)?;
                Ok((ciphertext, Bytes::copy_from_slice(&params)))
            }
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let params = salt.to_be_bytes();
                let iv = aes_iv(engine_boots, engine_time, &params);
                let mut buffer = plaintext.to_vec();
                self.aes_cfb(&iv, &mut buffer, true)?;
                Ok((Bytes::from(buffer), Bytes::copy_from_slice(&params)))
            }
        }
    }

    /// Decrypt msgData. `target` only labels the error.
    ///
    /// CBC output keeps its block padding; the BER decoder stops at the end
    /// of the ScopedPDU sequence.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
        target: SocketAddr,
    ) -> Result<Bytes> {
        self.check_key_len(Some(target))?;
        let params: [u8; 8] = priv_params.try_into().map_err(|_| {
            crypto_fault(
                target,
                CryptoFault::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            )
        })?;
        match self.protocol {
            PrivProtocol::Des | PrivProtocol::TripleDes => {
                self.cbc_decrypt(ciphertext, &params, target)
            }
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let iv = aes_iv(engine_boots, engine_time, &params);
                let mut buffer = ciphertext.to_vec();
                self.aes_cfb(&iv, &mut buffer, false)
                    .map_err(|_| crypto_fault(target, CryptoFault::CipherInit))?;
                Ok(Bytes::from(buffer))
            }
        }
    }

    fn check_key_len(&self, target: Option<SocketAddr>) -> Result<()> {
        let needed = self.protocol.key_len();
        if self.key.len() >= needed {
            return Ok(());
        }
        let fault = CryptoFault::ShortKey {
            needed,
            actual: self.key.len(),
        };
        match target {
            Some(target) => Err(crypto_fault(target, fault)),
            None => Err(Error::Config(fault.to_string().into()).boxed()),
        }
    }

    /// Cipher key and pre-IV for the CBC protocols.
    fn cbc_parts(&self) -> (&[u8], &[u8]) {
        let split = self.protocol.key_len() - 8;
        (&self.key[..split], &self.key[split..split + 8])
    }

    fn cbc_encrypt(&self, plaintext: &[u8], salt: &[u8; 8]) -> Result<Bytes> {
        use cbc::cipher::block_padding::NoPadding;
        use cbc::cipher::{BlockEncryptMut, KeyIvInit};

        let (key, pre_iv) = self.cbc_parts();
        let iv = xor_iv(pre_iv, salt);

        let padded_len = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);

        let encrypt_err = || Error::Config(CryptoFault::CipherInit.to_string().into()).boxed();
        let len = match self.protocol {
            PrivProtocol::TripleDes => cbc::Encryptor::<des::TdesEde3>::new_from_slices(key, &iv)
                .map_err(|_| encrypt_err())?
                .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
                .map_err(|_| encrypt_err())?
                .len(),
            _ => cbc::Encryptor::<des::Des>::new_from_slices(key, &iv)
                .map_err(|_| encrypt_err())?
                .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
                .map_err(|_| encrypt_err())?
                .len(),
        };
        buffer.truncate(len);
        Ok(Bytes::from(buffer))
    }

    fn cbc_decrypt(&self, ciphertext: &[u8], salt: &[u8; 8], target: SocketAddr) -> Result<Bytes> {
        use cbc::cipher::block_padding::NoPadding;
        use cbc::cipher::{BlockDecryptMut, KeyIvInit};

        if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(8) {
            return Err(crypto_fault(
                target,
                CryptoFault::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block: 8,
                },
            ));
        }

        let (key, pre_iv) = self.cbc_parts();
        let iv = xor_iv(pre_iv, salt);
        let mut buffer = ciphertext.to_vec();
        let init_err = |_| crypto_fault(target, CryptoFault::CipherInit);
        let len = match self.protocol {
            PrivProtocol::TripleDes => cbc::Decryptor::<des::TdesEde3>::new_from_slices(key, &iv)
                .map_err(init_err)?
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .map_err(|_| crypto_fault(target, CryptoFault::CipherInit))?
                .len(),
            _ => cbc::Decryptor::<des::Des>::new_from_slices(key, &iv)
                .map_err(init_err)?
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .map_err(|_| crypto_fault(target, CryptoFault::CipherInit))?
                .len(),
        };
        buffer.truncate(len);
        Ok(Bytes::from(buffer))
    }

    fn aes_cfb(&self, iv: &[u8; 16], buffer: &mut [u8], encrypt: bool) -> Result<()> {
        use aes::{Aes128, Aes192, Aes256};
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        macro_rules! run {
            ($cipher:ty) => {{
                let key = &self.key[..self.protocol.key_len()];
                let err = |_| Error::Config(CryptoFault::CipherInit.to_string().into()).boxed();
                if encrypt {
                    cfb_mode::Encryptor::<$cipher>::new_from_slices(key, iv)
                        .map_err(err)?
                        .encrypt(buffer);
                } else {
                    cfb_mode::Decryptor::<$cipher>::new_from_slices(key, iv)
                        .map_err(err)?
                        .decrypt(buffer);
                }
            }};
        }

        match self.protocol {
            PrivProtocol::Aes128 => run!(Aes128),
            PrivProtocol::Aes192 => run!(Aes192),
            PrivProtocol::Aes256 => run!(Aes256),
            PrivProtocol::Des | PrivProtocol::TripleDes => {
                return Err(Error::Config("AES-CFB used with a DES key".into()).boxed());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn xor_iv(pre_iv: &[u8], salt: &[u8; 8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for ((out, a), b) in iv.iter_mut().zip(pre_iv).zip(salt) {
        *out = a ^ b;
    }
    iv
}

fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}

fn crypto_fault(target: SocketAddr, fault: CryptoFault) -> Box<Error> {
    tracing::debug!(target: "snmp_credcheck::crypto", { snmp.target = %target, kind = %fault }, "decryption failed");
    Error::Decrypt { target }.boxed()
}
