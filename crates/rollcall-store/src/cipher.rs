//! AES-256-GCM sealing of embedding payloads.
//!
//! Embeddings are biometric data, so they never hit disk in the clear.
//! Blob layout: 12-byte random nonce followed by the GCM ciphertext of
//! the JSON-encoded vector.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rollcall_core::Embedding;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("embedding encryption failed")]
    Encrypt,
    #[error("embedding decryption failed (wrong key or corrupt blob)")]
    Decrypt,
    #[error("sealed blob shorter than nonce")]
    Truncated,
    #[error("embedding payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Seals and opens embedding blobs under a key derived from an
/// operator-supplied secret.
pub struct EmbeddingCipher {
    cipher: Aes256Gcm,
}

impl EmbeddingCipher {
    /// Derive the AES-256 key as SHA-256 of the secret.
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn seal(&self, embedding: &Embedding) -> Result<Vec<u8>, CipherError> {
        let payload = serde_json::to_vec(&embedding.values)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, payload.as_ref())
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn open(&self, blob: &[u8]) -> Result<Embedding, CipherError> {
        if blob.len() < NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let payload = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CipherError::Decrypt)?;

        let values: Vec<f32> = serde_json::from_slice(&payload)?;
        Ok(Embedding::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_round_trip() {
        let cipher = EmbeddingCipher::from_secret("class key");
        let embedding = Embedding::new(vec![0.25, -1.5, 3.75]);
        let blob = cipher.seal(&embedding).unwrap();
        assert_eq!(cipher.open(&blob).unwrap(), embedding);
    }

    #[test]
    fn test_seal_is_randomized() {
        // Same plaintext, fresh nonce each time
        let cipher = EmbeddingCipher::from_secret("class key");
        let embedding = Embedding::new(vec![1.0, 2.0]);
        let a = cipher.seal(&embedding).unwrap();
        let b = cipher.seal(&embedding).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_to_open() {
        let embedding = Embedding::new(vec![1.0, 2.0]);
        let blob = EmbeddingCipher::from_secret("right key")
            .seal(&embedding)
            .unwrap();
        let result = EmbeddingCipher::from_secret("wrong key").open(&blob);
        assert!(matches!(result, Err(CipherError::Decrypt)));
    }

    #[test]
    fn test_tampered_blob_fails_to_open() {
        let cipher = EmbeddingCipher::from_secret("class key");
        let mut blob = cipher.seal(&Embedding::new(vec![1.0])).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(cipher.open(&blob), Err(CipherError::Decrypt)));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let cipher = EmbeddingCipher::from_secret("class key");
        assert!(matches!(
            cipher.open(&[0u8; 5]),
            Err(CipherError::Truncated)
        ));
    }
}
