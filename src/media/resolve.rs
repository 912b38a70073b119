//! Resolution of a verified proxy request to its upstream image URL.

use super::cipher::decrypt_source_url;
use super::error::MediaError;
use super::keys::MediaKeys;
use super::{parse_allowed_media_url, UnsignedProxyRequest};
use reqwest::Url;
use tracing::error;

/// Decrypt `u`, re-check the host allow-list, and apply the transform
/// parameters to the source URL's query.
///
/// Only call this after the signature has been verified. A host failure here
/// means an earlier check was bypassed and is reported as an internal error.
pub fn build_upstream_url(
    keys: &MediaKeys,
    request: &UnsignedProxyRequest,
) -> Result<Url, MediaError> {
    let mut upstream = decrypt_source_url(keys, &request.u)
        .and_then(|source| parse_allowed_media_url(&source))
        .ok_or_else(|| {
            error!("Verified media request failed upstream host re-validation");
            MediaError::Internal("upstream host re-validation failed".to_string())
        })?;

    let params = &request.params;
    if params.is_empty() {
        return Ok(upstream);
    }

    let overrides = [
        ("w", params.w.map(|v| v.to_string())),
        ("h", params.h.map(|v| v.to_string())),
        ("q", params.q.map(|v| v.to_string())),
        ("fit", params.fit.map(|f| f.as_str().to_string())),
    ];
    let mut pairs: Vec<(String, String)> = upstream.query_pairs().into_owned().collect();
    for (key, value) in overrides {
        if let Some(value) = value {
            set_query_param(&mut pairs, key, value);
        }
    }
    upstream.query_pairs_mut().clear().extend_pairs(&pairs);
    Ok(upstream)
}

/// Replace the first `key` in place and drop later duplicates, or append.
fn set_query_param(pairs: &mut Vec<(String, String)>, key: &str, value: String) {
    match pairs.iter().position(|(k, _)| k == key) {
        Some(first) => {
            pairs[first].1 = value;
            let mut index = 0;
            pairs.retain(|(k, _)| {
                let keep = k != key || index == first;
                index += 1;
                keep
            });
        }
        None => pairs.push((key.to_string(), value)),
    }
}
