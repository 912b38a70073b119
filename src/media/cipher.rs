//! AES-256-GCM encryption of upstream source URLs.
//!
//! Token layout before encoding: `nonce (12) || tag (16) || ciphertext`,
//! rendered as URL-safe base64 without padding. Every call draws a fresh nonce,
//! so equal URLs never produce equal tokens.

use super::error::MediaError;
use super::keys::MediaKeys;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = NONCE_LEN + TAG_LEN;

/// URL-safe alphabet, no padding on output, padding optional on input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn cipher(keys: &MediaKeys) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(keys.encryption_key()))
}

/// Encrypt a source URL into an opaque `u` token.
pub fn encrypt_source_url(keys: &MediaKeys, url: &str) -> Result<String, MediaError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut buffer = url.as_bytes().to_vec();
    let tag = cipher(keys)
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer)
        .map_err(|_| MediaError::Internal("source url encryption failed".to_string()))?;

    let mut payload = Vec::with_capacity(HEADER_LEN + buffer.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&tag);
    payload.extend_from_slice(&buffer);
    Ok(TOKEN_ENGINE.encode(payload))
}

/// Decrypt a `u` token. Every failure mode collapses to `None`.
///
/// Only the minimum length is checked up front; anything long enough goes
/// through the full authenticated decrypt.
pub fn decrypt_source_url(keys: &MediaKeys, token: &str) -> Option<String> {
    let payload = TOKEN_ENGINE.decode(token).ok()?;
    if payload.len() <= HEADER_LEN {
        return None;
    }

    let (nonce, rest) = payload.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);
    let mut buffer = ciphertext.to_vec();
    cipher(keys)
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .ok()?;

    String::from_utf8(buffer).ok().filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::keys::MediaSecret;

    fn keys(secret: &str) -> MediaKeys {
        MediaKeys::derive(&MediaSecret::new(secret).unwrap())
    }

    const SOURCE: &str = "https://images.microcms-assets.io/assets/a.png";

    #[test]
    fn test_encrypt_decrypt() {
        let keys = keys("cipher-test-secret");
        let token = encrypt_source_url(&keys, SOURCE).unwrap();
        assert!(token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        assert_eq!(decrypt_source_url(&keys, &token).as_deref(), Some(SOURCE));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let keys = keys("cipher-test-secret");
        let a = encrypt_source_url(&keys, SOURCE).unwrap();
        let b = encrypt_source_url(&keys, SOURCE).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_source_url(&keys, &a), decrypt_source_url(&keys, &b));
    }

    #[test]
    fn test_padded_token_accepted() {
        let keys = keys("cipher-test-secret");
        let token = encrypt_source_url(&keys, SOURCE).unwrap();
        let padded = format!("{}{}", token, "=".repeat((4 - token.len() % 4) % 4));
        assert_eq!(decrypt_source_url(&keys, &padded).as_deref(), Some(SOURCE));
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = encrypt_source_url(&keys("first"), SOURCE).unwrap();
        assert_eq!(decrypt_source_url(&keys("second"), &token), None);
    }

    #[test]
    fn test_tampered_token_fails() {
        let keys = keys("cipher-test-secret");
        let token = encrypt_source_url(&keys, SOURCE).unwrap();
        let mut payload = TOKEN_ENGINE.decode(&token).unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        assert_eq!(decrypt_source_url(&keys, &TOKEN_ENGINE.encode(payload)), None);
    }

    #[test]
    fn test_malformed_tokens() {
        let keys = keys("cipher-test-secret");
        assert_eq!(decrypt_source_url(&keys, ""), None);
        assert_eq!(decrypt_source_url(&keys, "not base64 !!"), None);
        // Exactly nonce + tag, no ciphertext.
        assert_eq!(decrypt_source_url(&keys, &TOKEN_ENGINE.encode([0u8; 28])), None);
        assert_eq!(decrypt_source_url(&keys, &TOKEN_ENGINE.encode([7u8; 64])), None);
    }
}
