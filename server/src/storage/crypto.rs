//! AES-GCM encryption of stored objects.
//!
//! The AES variant follows the key length: 16 bytes selects AES-128-GCM,
//! 24 bytes AES-192-GCM and 32 bytes AES-256-GCM.
//! Record format: nonce (12 bytes) || ciphertext || GCM tag (16 bytes)

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use rand::Rng;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the random nonce that prefixes every record.
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Key lengths accepted by [`SymmetricKey::new`].
pub const KEY_LENGTHS: [usize; 3] = [16, 24, 32];

type Aes192Gcm = AesGcm<Aes192, U12>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid key length {0} (expected 16, 24 or 32 bytes)")]
    InvalidKeyLength(usize),

    #[error("key is not valid hex")]
    InvalidKeyEncoding,

    #[error("cipher record too short ({len} bytes, need at least {NONCE_LEN})")]
    RecordTooShort { len: usize },

    #[error("encryption failed")]
    EncryptFailed,

    /// Wrong key, or the record was corrupted or tampered with.
    #[error("decryption failed: authentication tag did not verify")]
    DecryptFailed,
}

/// Process-wide storage key.
///
/// Key bytes are zeroized on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    pub fn new(bytes: Vec<u8>) -> Result<Self, CodecError> {
        if !KEY_LENGTHS.contains(&bytes.len()) {
            return Err(CodecError::InvalidKeyLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded key, as accepted from config and environment.
    pub fn from_hex(encoded: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| CodecError::InvalidKeyEncoding)?;
        Self::new(bytes)
    }

    /// Generate a random 256-bit key.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::rng().random();
        Self(bytes.to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("len", &self.0.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

fn seal<C>(cipher: C, plaintext: &[u8]) -> Result<Vec<u8>, CodecError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CodecError::EncryptFailed)?;

    let mut record = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    record.extend_from_slice(&nonce_bytes);
    record.extend_from_slice(&ciphertext);
    Ok(record)
}

fn open<C>(cipher: C, record: &[u8]) -> Result<Vec<u8>, CodecError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    let (nonce, ciphertext) = record.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CodecError::DecryptFailed)
}

/// Encrypt `plaintext` under `key` with a freshly generated nonce.
///
/// Returns `nonce (12 bytes) || ciphertext (includes 16-byte GCM tag)`.
pub fn encode(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CodecError> {
    let bytes = key.as_bytes();
    let invalid = |_| CodecError::InvalidKeyLength(bytes.len());
    match bytes.len() {
        16 => seal(Aes128Gcm::new_from_slice(bytes).map_err(invalid)?, plaintext),
        24 => seal(Aes192Gcm::new_from_slice(bytes).map_err(invalid)?, plaintext),
        32 => seal(Aes256Gcm::new_from_slice(bytes).map_err(invalid)?, plaintext),
        n => Err(CodecError::InvalidKeyLength(n)),
    }
}

/// Decrypt a record produced by [`encode`].
///
/// Fails without returning any plaintext if the tag does not verify.
pub fn decode(record: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CodecError> {
    if record.len() < NONCE_LEN {
        return Err(CodecError::RecordTooShort { len: record.len() });
    }
    let bytes = key.as_bytes();
    let invalid = |_| CodecError::InvalidKeyLength(bytes.len());
    match bytes.len() {
        16 => open(Aes128Gcm::new_from_slice(bytes).map_err(invalid)?, record),
        24 => open(Aes192Gcm::new_from_slice(bytes).map_err(invalid)?, record),
        32 => open(Aes256Gcm::new_from_slice(bytes).map_err(invalid)?, record),
        n => Err(CodecError::InvalidKeyLength(n)),
    }
}
