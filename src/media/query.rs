//! Strict parsing of inbound `/api/media` query strings.
//!
//! Checks run in a fixed order and stop at the first failure:
//! unknown keys, missing `u`, undecryptable `u`, disallowed host, malformed
//! `sig`, then each transform parameter. The result is parsed but not yet
//! authenticated.

use super::cipher::decrypt_source_url;
use super::error::MediaError;
use super::keys::MediaKeys;
use super::params::TransformParams;
use super::{
    has_only_allowed_query_keys, is_allowed_media_url, SignedProxyRequest, UnsignedProxyRequest,
};

const SIG_HEX_LEN: usize = 64;

/// First value for `key`; repeated keys are ignored after the first.
fn first<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Parse a raw query string (without the leading `?`).
pub fn parse_proxy_query(
    keys: &MediaKeys,
    raw_query: &str,
) -> Result<SignedProxyRequest, MediaError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(raw_query).map_err(|_| MediaError::InvalidQuery)?;

    if !has_only_allowed_query_keys(pairs.iter().map(|(k, _)| k.as_str())) {
        return Err(MediaError::InvalidQueryKeys);
    }

    let u = match first(&pairs, "u") {
        Some(u) if !u.is_empty() => u,
        _ => return Err(MediaError::MissingSource),
    };
    let source_url = decrypt_source_url(keys, u).ok_or(MediaError::InvalidSource)?;
    if !is_allowed_media_url(&source_url) {
        return Err(MediaError::HostNotAllowed);
    }

    let sig = match first(&pairs, "sig") {
        Some(sig) if sig.len() == SIG_HEX_LEN && sig.bytes().all(|b| b.is_ascii_hexdigit()) => {
            sig.to_ascii_lowercase()
        }
        _ => return Err(MediaError::InvalidSignatureFormat),
    };

    let params = TransformParams::from_raw(
        first(&pairs, "w"),
        first(&pairs, "h"),
        first(&pairs, "q"),
        first(&pairs, "fit"),
    )?;

    Ok(SignedProxyRequest {
        unsigned: UnsignedProxyRequest {
            u: u.to_string(),
            params,
        },
        sig,
    })
}
