//! Hash operator

use crate::domain::{Result, VeilError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Default number of hex characters kept from the digest
pub const DEFAULT_HASH_LENGTH: usize = 16;

/// Digest used by the hash operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Length of the full hex digest
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(VeilError::Configuration(format!(
                "Unknown hash algorithm '{other}'. Must be one of: sha256, sha512"
            ))),
        }
    }
}

/// Lowercase hex digest of `salt || text`, truncated to `length` characters
pub fn hash_value(text: &str, algorithm: HashAlgorithm, salt: Option<&str>, length: usize) -> String {
    let salt = salt.unwrap_or_default();
    let mut digest = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(salt.as_bytes());
            hasher.update(text.as_bytes());
            format!("{:x}", hasher.finalize())
        }
        HashAlgorithm::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(salt.as_bytes());
            hasher.update(text.as_bytes());
            format!("{:x}", hasher.finalize())
        }
    };
    digest.truncate(length.min(algorithm.hex_len()));
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sha256_digest() {
        let full = hash_value("abc", HashAlgorithm::Sha256, None, 64);
        assert_eq!(
            full,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_value("abc", HashAlgorithm::Sha256, None, 16), "ba7816bf8f01cfea");
    }

    #[test]
    fn test_deterministic_and_salted() {
        let a = hash_value("123 456 782", HashAlgorithm::Sha256, Some("pepper"), 16);
        let b = hash_value("123 456 782", HashAlgorithm::Sha256, Some("pepper"), 16);
        let unsalted = hash_value("123 456 782", HashAlgorithm::Sha256, None, 16);
        assert_eq!(a, b);
        assert_ne!(a, unsalted);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sha512_length_is_capped() {
        let digest = hash_value("abc", HashAlgorithm::Sha512, None, 500);
        assert_eq!(digest.len(), 128);
        assert!(digest.starts_with("ddaf35a193617aba"));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("md5".parse::<HashAlgorithm>().unwrap_err().is_configuration());
    }
}
