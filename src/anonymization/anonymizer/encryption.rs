//! Reversible encryption operator
//!
//! Values are sealed with AES-256-GCM under a key derived from the configured
//! passphrase with PBKDF2-HMAC-SHA256. Each token carries its own random
//! nonce, so equal inputs produce different tokens.

use crate::config::SecretString;
use crate::domain::{Result, VeilError};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::fmt;

/// Prefix of every encrypted token
pub const ENCRYPTED_PREFIX: &str = "ENC[AES256GCM]:";

const KEY_SALT: &[u8] = b"veil-encrypt-operator-v1";
const PBKDF2_ROUNDS: u32 = 100_000;
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for span values
pub struct ValueCipher {
    key: Secret<[u8; 32]>,
}

impl fmt::Debug for ValueCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ValueCipher {
    /// Derive a cipher from a passphrase
    ///
    /// # Errors
    ///
    /// An empty passphrase is a configuration error.
    pub fn new(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(VeilError::Configuration(
                "Encryption key must not be empty".to_string(),
            ));
        }
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KEY_SALT, PBKDF2_ROUNDS, &mut key);
        Ok(Self {
            key: Secret::new(key),
        })
    }

    /// Build a cipher from a configured secret
    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::new(key.expose_secret().as_str())
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.expose_secret())
            .map_err(|e| VeilError::Encryption(format!("Invalid key: {e}")))
    }

    /// Encrypt a value into an `ENC[AES256GCM]:` token
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VeilError::Encryption(format!("Encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", STANDARD.encode(sealed)))
    }

    /// Decrypt a token produced by [`ValueCipher::encrypt`]
    pub fn decrypt(&self, token: &str) -> Result<String> {
        let encoded = token.strip_prefix(ENCRYPTED_PREFIX).ok_or_else(|| {
            VeilError::Encryption("Token is missing the ENC[AES256GCM] prefix".to_string())
        })?;
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| VeilError::Encryption(format!("Invalid token encoding: {e}")))?;

        if sealed.len() < NONCE_LEN {
            return Err(VeilError::Encryption("Token too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher()?
            .decrypt(nonce, ciphertext)
            .map_err(|e| VeilError::Encryption(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| VeilError::Encryption(format!("Decrypted value is not UTF-8: {e}")))
    }
}

/// Decrypt a token with the passphrase it was encrypted under
pub fn decrypt_value(token: &str, key: &SecretString) -> Result<String> {
    ValueCipher::from_secret(key)?.decrypt(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = ValueCipher::new("correct horse battery staple").unwrap();
        let token = cipher.encrypt("123 456 782").unwrap();

        assert!(token.starts_with(ENCRYPTED_PREFIX));
        assert!(!token.contains("123 456 782"));
        assert_eq!(cipher.decrypt(&token).unwrap(), "123 456 782");
    }

    #[test]
    fn test_nonce_makes_tokens_unique() {
        let cipher = ValueCipher::new("passphrase").unwrap();
        let a = cipher.encrypt("Jane Citizen").unwrap();
        let b = cipher.encrypt("Jane Citizen").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_value_with_wrong_key_fails() {
        let token = ValueCipher::new("right").unwrap().encrypt("secret").unwrap();

        assert_eq!(decrypt_value(&token, &secret_string("right")).unwrap(), "secret");
        let err = decrypt_value(&token, &secret_string("wrong")).unwrap_err();
        assert!(matches!(err, VeilError::Encryption(_)));
    }

    #[test]
    fn test_malformed_tokens() {
        let cipher = ValueCipher::new("k").unwrap();
        assert!(cipher.decrypt("plain text").is_err());
        assert!(cipher.decrypt("ENC[AES256GCM]:not base64!").is_err());
        assert!(cipher.decrypt("ENC[AES256GCM]:AAAA").is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(ValueCipher::new("").unwrap_err().is_configuration());
        let debug = format!("{:?}", ValueCipher::new("hunter2").unwrap());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
