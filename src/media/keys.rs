//! Process-wide proxy secret and the two keys derived from it.
//!
//! The HMAC key is the secret itself. The AES-256 key is `SHA-256(secret)`, so
//! the signing and encryption paths never share raw key material.

use crate::config::ConfigError;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// The configured proxy secret. Never printed.
pub struct MediaSecret(Zeroizing<String>);

impl MediaSecret {
    /// Wrap a secret value. Empty values are rejected rather than defaulted.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = Zeroizing::new(value.into());
        if value.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self(value))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MediaSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MediaSecret([REDACTED])")
    }
}

/// Key material for signing and encrypting proxy URLs.
pub struct MediaKeys {
    mac_key: Zeroizing<Vec<u8>>,
    encryption_key: Zeroizing<[u8; 32]>,
}

impl MediaKeys {
    pub fn derive(secret: &MediaSecret) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut encryption_key = Zeroizing::new([0u8; 32]);
        encryption_key.copy_from_slice(&digest);

        Self {
            mac_key: Zeroizing::new(secret.as_bytes().to_vec()),
            encryption_key,
        }
    }

    pub(crate) fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }

    pub(crate) fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption_key
    }
}

impl fmt::Debug for MediaKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaKeys").finish_non_exhaustive()
    }
}
