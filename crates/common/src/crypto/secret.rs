//! Record encryption using ChaCha20-Poly1305
//!
//! Every entity gets one `Secret` at first write. The same secret keys the
//! entity's DSSE engine and seals its record payload. Sealed records carry
//! the nonce and the Poly1305 tag detached from the ciphertext so that
//! a store can hold the three parts independently.

use std::fmt;
use std::ops::Deref;

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use serde::{Deserialize, Serialize};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of a symmetric key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("cipher error: {0}")]
    Default(#[from] anyhow::Error),
    /// Tag verification failed, or the sealed record is malformed
    #[error("integrity check failed: {0}")]
    Integrity(String),
}

/// A 256-bit symmetric key
///
/// `Debug` never prints key bytes.
#[derive(PartialEq, Eq, Clone)]
pub struct Secret([u8; SECRET_SIZE]);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using the system RNG
    pub fn generate() -> Result<Self, CipherError> {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate secret: {}", e))?;
        Ok(Self(buff))
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, CipherError> {
        if data.len() != SECRET_SIZE {
            return Err(anyhow::anyhow!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// An encrypted record: `{ciphertext, nonce, tag}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub tag: Vec<u8>,
}

impl SealedRecord {
    /// Total number of bytes held by the record
    pub fn len(&self) -> usize {
        self.ciphertext.len() + self.nonce.len() + self.tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

/// Authenticated symmetric cipher used for record payloads
pub trait RecordCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key: &Secret) -> Result<SealedRecord, CipherError>;

    /// # Errors
    ///
    /// Fails with `CipherError::Integrity` on tag mismatch or malformed input.
    fn decrypt(&self, sealed: &SealedRecord, key: &Secret) -> Result<Vec<u8>, CipherError>;
}

/// ChaCha20-Poly1305 with a random 96-bit nonce per record
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaChaCipher;

impl RecordCipher for ChaChaCipher {
    fn encrypt(&self, plaintext: &[u8], key: &Secret) -> Result<SealedRecord, CipherError> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.bytes()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(nonce, b"", &mut buffer)
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        Ok(SealedRecord {
            ciphertext: buffer,
            nonce: nonce_bytes.to_vec(),
            tag: tag.to_vec(),
        })
    }

    fn decrypt(&self, sealed: &SealedRecord, key: &Secret) -> Result<Vec<u8>, CipherError> {
        if sealed.nonce.len() != NONCE_SIZE {
            return Err(CipherError::Integrity(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                sealed.nonce.len()
            )));
        }
        if sealed.tag.len() != TAG_SIZE {
            return Err(CipherError::Integrity(format!(
                "tag must be {} bytes, got {}",
                TAG_SIZE,
                sealed.tag.len()
            )));
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.bytes()));
        let nonce = Nonce::from_slice(&sealed.nonce);
        let tag = Tag::from_slice(&sealed.tag);

        let mut buffer = sealed.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
            .map_err(|_| CipherError::Integrity("tag mismatch".to_string()))?;

        Ok(buffer)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
