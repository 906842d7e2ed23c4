//! Key generation and the option cipher.
//!
//! Sealing is deterministic: the nonce is an HMAC of the plaintext, so the
//! same name under the same key always seals to the same text and can be used
//! as a lookup predicate. Opening checks both the Poly1305 tag and that the
//! nonce matches the recovered plaintext.

use crate::error::{Result, StoreError};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Length of the stored key string.
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

const CIPHER_LABEL: &[u8] = b"optstore/cipher/v1";
const NONCE_LABEL: &[u8] = b"optstore/nonce/v1";

type HmacSha256 = Hmac<Sha256>;

/// A fresh 32-character `[A-Za-z0-9]` key from the OS random source.
pub fn generate_key() -> String {
    OsRng
        .sample_iter(Alphanumeric)
        .take(KEY_LEN)
        .map(char::from)
        .collect()
}

/// Seals and opens option names and values under one stored key.
pub struct Cipher {
    aead: XChaCha20Poly1305,
    nonce_key: [u8; 32],
}

impl Cipher {
    pub fn new(secret: &str) -> Self {
        let cipher_key = derive(CIPHER_LABEL, secret);
        Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(&cipher_key)),
            nonce_key: derive(NONCE_LABEL, secret),
        }
    }

    /// Encrypt `plaintext` to base64 of `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = self.synthetic_nonce(plaintext.as_bytes())?;
        let ciphertext = self
            .aead
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| StoreError::Crypto(format!("encrypt: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn open(&self, sealed: &str) -> Result<String> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|e| StoreError::Crypto(format!("decode: {e}")))?;
        if bytes.len() < NONCE_LEN {
            return Err(StoreError::Crypto("sealed value is too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|e| StoreError::Crypto(format!("decrypt: {e}")))?;

        self.nonce_mac(&plaintext)?
            .verify_truncated_left(nonce)
            .map_err(|_| StoreError::Crypto("nonce does not match plaintext".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| StoreError::Crypto(format!("utf-8: {e}")))
    }

    fn nonce_mac(&self, plaintext: &[u8]) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.nonce_key)
            .map_err(|e| StoreError::Crypto(format!("hmac: {e}")))?;
        mac.update(plaintext);
        Ok(mac)
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> Result<[u8; NONCE_LEN]> {
        let tag = self.nonce_mac(plaintext)?.finalize().into_bytes();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&tag[..NONCE_LEN]);
        Ok(nonce)
    }
}

fn derive(label: &[u8], secret: &str) -> [u8; 32] {
    let digest = Sha256::new()
        .chain_update(label)
        .chain_update(secret.as_bytes())
        .finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}
