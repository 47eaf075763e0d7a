//! Symmetric encryption for file content at rest on the remote store.
//!
//! Content is sealed with AES-256-GCM under a key derived from the user's
//! passphrase. The wire format is `base64(nonce || ciphertext)` with a fresh
//! random 12-byte nonce per seal, so sealing the same content twice yields
//! different payloads. The remote store only ever sees sealed payloads plus
//! plaintext content hashes for drift detection.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::VaultError;

/// AES-GCM nonce size in bytes.
const NONCE_LEN: usize = 12;

/// Domain separation for the passphrase-to-key derivation.
const KEY_CONTEXT: &[u8] = b"confsync-vault-key-v1";

/// Encrypts and decrypts tracked-file content with a passphrase-derived key.
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Build a vault from a passphrase.
    ///
    /// The key is SHA-256 over a fixed context string plus the passphrase.
    /// Both machines must be configured with the same passphrase or every
    /// pull will fail with [`VaultError::DecryptFailed`].
    #[must_use]
    pub fn new(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_CONTEXT);
        hasher.update(passphrase.as_bytes());
        let key_bytes = hasher.finalize();

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt `content` into a base64 payload.
    pub fn seal(&self, content: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, content.as_bytes())
            .map_err(|_| VaultError::EncryptFailed)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Decrypt a base64 payload produced by [`Vault::seal`].
    pub fn open(&self, payload: &str) -> Result<String, VaultError> {
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| VaultError::MalformedPayload(e.to_string()))?;

        if bytes.len() <= NONCE_LEN {
            return Err(VaultError::MalformedPayload(format!(
                "payload too short ({} bytes)",
                bytes.len()
            )));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_round_trip() {
        let vault = Vault::new("correct horse battery staple");
        let sealed = vault.seal("API_KEY=secret\n").unwrap();
        assert_ne!(sealed, "API_KEY=secret\n");
        assert_eq!(vault.open(&sealed).unwrap(), "API_KEY=secret\n");
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let vault = Vault::new("pass");
        let a = vault.seal("same content").unwrap();
        let b = vault.seal("same content").unwrap();
        assert_ne!(a, b);
        assert_eq!(vault.open(&a).unwrap(), vault.open(&b).unwrap());
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let sealed = Vault::new("right").seal("secret").unwrap();
        let err = Vault::new("wrong").open(&sealed).unwrap_err();
        assert!(matches!(err, VaultError::DecryptFailed));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let vault = Vault::new("pass");
        let sealed = vault.seal("secret").unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(bytes);
        assert!(matches!(
            vault.open(&tampered),
            Err(VaultError::DecryptFailed)
        ));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        let vault = Vault::new("pass");
        assert!(matches!(
            vault.open("not base64!!!"),
            Err(VaultError::MalformedPayload(_))
        ));
        // Valid base64, but shorter than a nonce.
        assert!(matches!(
            vault.open(&BASE64.encode([0u8; 4])),
            Err(VaultError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_empty_content_round_trips() {
        let vault = Vault::new("pass");
        let sealed = vault.seal("").unwrap();
        assert_eq!(vault.open(&sealed).unwrap(), "");
    }
}
