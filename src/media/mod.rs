//! Signed media proxy core.
//!
//! Pages reference third-party images as `/api/media?u=...&sig=...`:
//! - `params`: transform parameters and range validation
//! - `keys`: the process secret and the keys derived from it
//! - `cipher`: AES-256-GCM encryption of the source URL into `u`
//! - `signer`: canonical query, HMAC signing and verification, URL building
//! - `query`: strict parsing of inbound proxy queries
//! - `resolve`: mapping a verified request to the upstream URL

pub mod cipher;
pub mod error;
pub mod keys;
pub mod params;
pub mod query;
pub mod resolve;
pub mod signer;

pub use error::MediaError;
pub use keys::{MediaKeys, MediaSecret};
pub use params::{ImageFit, ParamError, TransformParams};
pub use query::parse_proxy_query;
pub use resolve::build_upstream_url;
pub use signer::{canonicalize, verify_signature, MediaSigner};

use reqwest::Url;

/// Path of the proxy endpoint.
pub const MEDIA_PROXY_PATH: &str = "/api/media";

/// The only query keys the endpoint accepts.
pub const ALLOWED_QUERY_KEYS: [&str; 6] = ["u", "w", "h", "q", "fit", "sig"];

/// Upstream hosts the proxy will fetch from.
pub const ALLOWED_IMAGE_HOSTS: [&str; 2] = ["images.microcms-assets.io", "images.microcms.io"];

/// A proxy request before signing: encrypted source token plus transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedProxyRequest {
    pub u: String,
    pub params: TransformParams,
}

/// A parsed proxy request carrying its signature. Parsed is not verified;
/// see [`verify_signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedProxyRequest {
    pub unsigned: UnsignedProxyRequest,
    /// Lowercase hex HMAC-SHA256.
    pub sig: String,
}

pub fn has_only_allowed_query_keys<'a>(mut keys: impl Iterator<Item = &'a str>) -> bool {
    keys.all(|key| ALLOWED_QUERY_KEYS.contains(&key))
}

/// `https` URL whose hostname is on the allow-list (exact, case-insensitive).
pub fn is_allowed_media_url(url: &str) -> bool {
    parse_allowed_media_url(url).is_some()
}

pub(crate) fn parse_allowed_media_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    ALLOWED_IMAGE_HOSTS
        .contains(&host.as_str())
        .then_some(parsed)
}
