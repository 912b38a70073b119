//! Proxy URL signing and signature verification.
//!
//! The signature is HMAC-SHA256 over the canonical query string, which always
//! lists present keys in the order `u, w, h, q, fit`. The signature binds the
//! encrypted token, not the plaintext URL behind it.

use super::cipher::encrypt_source_url;
use super::error::MediaError;
use super::keys::MediaKeys;
use super::params::TransformParams;
use super::{is_allowed_media_url, SignedProxyRequest, UnsignedProxyRequest, MEDIA_PROXY_PATH};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Deterministic query serialization used as the signing input.
pub fn canonicalize(request: &UnsignedProxyRequest) -> String {
    let params = &request.params;
    let mut pairs = vec![("u", request.u.clone())];
    if let Some(w) = params.w {
        pairs.push(("w", w.to_string()));
    }
    if let Some(h) = params.h {
        pairs.push(("h", h.to_string()));
    }
    if let Some(q) = params.q {
        pairs.push(("q", q.to_string()));
    }
    if let Some(fit) = params.fit {
        pairs.push(("fit", fit.as_str().to_string()));
    }

    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn compute_mac(keys: &MediaKeys, canonical: &str) -> Result<Vec<u8>, MediaError> {
    let mut mac = HmacSha256::new_from_slice(keys.mac_key())
        .map_err(|_| MediaError::Internal("HMAC key rejected".to_string()))?;
    mac.update(canonical.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Recompute the signature over the request's own fields and compare it to
/// the supplied one in constant time. Any internal failure reads as `false`.
pub fn verify_signature(keys: &MediaKeys, request: &SignedProxyRequest) -> bool {
    let expected = match compute_mac(keys, &canonicalize(&request.unsigned)) {
        Ok(expected) => expected,
        Err(_) => return false,
    };
    let provided = match hex::decode(&request.sig) {
        Ok(provided) => provided,
        Err(_) => return false,
    };
    if provided.len() != expected.len() {
        return false;
    }
    provided.as_slice().ct_eq(expected.as_slice()).into()
}

/// Turns upstream image URLs into signed first-party proxy URLs.
#[derive(Debug, Clone)]
pub struct MediaSigner {
    keys: Arc<MediaKeys>,
    public_url: String,
}

impl MediaSigner {
    /// `public_url` is the site origin used for absolute output, e.g.
    /// `https://example.com`.
    pub fn new(keys: Arc<MediaKeys>, public_url: impl Into<String>) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self { keys, public_url }
    }

    /// Build `/api/media?u=..&[w,h,q,fit]..&sig=..` for an allow-listed source.
    ///
    /// Empty input, site-relative paths and existing proxy URLs come back as
    /// they are (made absolute when asked). Sources on other hosts also come
    /// back unchanged so callers can fall back to the direct link. Invalid
    /// `params` are a caller bug and return an error.
    pub fn build_signed_proxy_url(
        &self,
        source_url: &str,
        params: &TransformParams,
        absolute: bool,
    ) -> Result<String, MediaError> {
        if source_url.is_empty() {
            return Ok(String::new());
        }
        if source_url.starts_with('/') || is_proxy_url(source_url) {
            return Ok(self.finish(source_url, absolute));
        }
        if !is_allowed_media_url(source_url) {
            debug!("Not signing media URL on a disallowed host");
            return Ok(source_url.to_string());
        }

        let unsigned = UnsignedProxyRequest {
            u: encrypt_source_url(&self.keys, source_url)?,
            params: params.normalize()?,
        };
        let canonical = canonicalize(&unsigned);
        let sig = hex::encode(compute_mac(&self.keys, &canonical)?);

        let path = format!("{}?{}&sig={}", MEDIA_PROXY_PATH, canonical, sig);
        Ok(self.finish(&path, absolute))
    }

    fn finish(&self, url: &str, absolute: bool) -> String {
        if absolute && strip_http_scheme(url).is_none() {
            format!("{}{}", self.public_url, url)
        } else {
            url.to_string()
        }
    }
}

fn strip_http_scheme(url: &str) -> Option<&str> {
    ["https://", "http://"].into_iter().find_map(|scheme| {
        url.get(..scheme.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(scheme))
            .map(|_| &url[scheme.len()..])
    })
}

/// `http(s)://<host>/api/media?...`, compared case-insensitively.
fn is_proxy_url(url: &str) -> bool {
    let Some(rest) = strip_http_scheme(url) else {
        return false;
    };
    let needle = "/api/media?";
    match rest.find('/') {
        Some(idx) if idx > 0 => rest[idx..]
            .get(..needle.len())
            .is_some_and(|path| path.eq_ignore_ascii_case(needle)),
        _ => false,
    }
}
