//! Runlog Crypto
//!
//! This crate defines the encryption service used for secret values in
//! persisted dictionaries. The storage layer only depends on the [`Cipher`]
//! trait; [`ChaChaCipher`] is the default implementation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Errors raised by encryption and decryption.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
  /// No key was supplied and the cipher has no default key.
  #[error("no encryption key configured")]
  MissingKey,

  /// The supplied key cannot be used.
  #[error("invalid encryption key: {message}")]
  InvalidKey { message: String },

  /// Encryption failed.
  #[error("encryption failed")]
  Encrypt,

  /// Decryption failed (wrong key or tampered ciphertext).
  #[error("decryption failed")]
  Decrypt,

  /// The ciphertext or decrypted bytes were not in the expected encoding.
  #[error("invalid ciphertext encoding: {message}")]
  Encoding { message: String },
}

/// Symmetric, keyed encryption of text values.
///
/// `key` overrides the implementation's default key for a single call.
/// Encryption need not be deterministic: the same plaintext may produce
/// different ciphertexts.
pub trait Cipher: Send + Sync {
  /// Encrypt `plaintext`, returning printable ciphertext.
  fn encrypt(&self, plaintext: &str, key: Option<&str>) -> Result<String, CryptoError>;

  /// Decrypt ciphertext produced by [`Cipher::encrypt`].
  fn decrypt(&self, ciphertext: &str, key: Option<&str>) -> Result<String, CryptoError>;
}

/// ChaCha20-Poly1305 cipher keyed by the SHA-256 digest of a key string.
///
/// Ciphertext is `base64(nonce || sealed)` with a random 96-bit nonce.
#[derive(Clone, Default)]
pub struct ChaChaCipher {
  default_key: Option<String>,
}

impl ChaChaCipher {
  /// Create a cipher without a default key; every call must pass one.
  pub fn new() -> Self {
    Self { default_key: None }
  }

  /// Create a cipher that falls back to `key` when a call passes none.
  pub fn with_default_key(key: impl Into<String>) -> Self {
    Self {
      default_key: Some(key.into()),
    }
  }

  fn aead(&self, key: Option<&str>) -> Result<ChaCha20Poly1305, CryptoError> {
    let key = key
      .or(self.default_key.as_deref())
      .ok_or(CryptoError::MissingKey)?;
    if key.is_empty() {
      return Err(CryptoError::InvalidKey {
        message: "key is empty".to_string(),
      });
    }

    let digest = Sha256::digest(key.as_bytes());
    Ok(ChaCha20Poly1305::new(Key::from_slice(digest.as_slice())))
  }
}

impl std::fmt::Debug for ChaChaCipher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChaChaCipher")
      .field("default_key", &self.default_key.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}

impl Cipher for ChaChaCipher {
  fn encrypt(&self, plaintext: &str, key: Option<&str>) -> Result<String, CryptoError> {
    let aead = self.aead(key)?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = aead
      .encrypt(&nonce, plaintext.as_bytes())
      .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);
    Ok(STANDARD.encode(out))
  }

  fn decrypt(&self, ciphertext: &str, key: Option<&str>) -> Result<String, CryptoError> {
    let aead = self.aead(key)?;
    let bytes = STANDARD
      .decode(ciphertext)
      .map_err(|e| CryptoError::Encoding {
        message: e.to_string(),
      })?;
    if bytes.len() < NONCE_LEN {
      return Err(CryptoError::Encoding {
        message: format!("ciphertext shorter than {} byte nonce", NONCE_LEN),
      });
    }

    let (nonce, sealed) = bytes.split_at(NONCE_LEN);
    let plain = aead
      .decrypt(Nonce::from_slice(nonce), sealed)
      .map_err(|_| CryptoError::Decrypt)?;

    String::from_utf8(plain).map_err(|e| CryptoError::Encoding {
      message: e.to_string(),
    })
  }
}
