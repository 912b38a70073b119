//! Image transform parameters and their validation.
//!
//! The same rules apply on both sides of the proxy: the signer normalizes
//! typed parameters before signing, and the query parser applies them to the
//! raw strings it receives. Absent fields stay absent; nothing is defaulted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest accepted width/height.
pub const MIN_DIMENSION: u32 = 1;
/// Largest accepted width/height.
pub const MAX_DIMENSION: u32 = 2000;
/// Lowest accepted quality.
pub const MIN_QUALITY: u32 = 40;
/// Highest accepted quality.
pub const MAX_QUALITY: u32 = 85;

/// Parameter validation failures. The display text is what clients see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("{0} must be an integer")]
    NotInteger(&'static str),

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
    },

    #[error("fit is invalid")]
    InvalidFit,
}

/// Resize mode forwarded to the upstream image host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    Clip,
    Clamp,
    Crop,
    Max,
}

impl ImageFit {
    pub const ALL: [ImageFit; 4] = [ImageFit::Clip, ImageFit::Clamp, ImageFit::Crop, ImageFit::Max];

    /// Wire name used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFit::Clip => "clip",
            ImageFit::Clamp => "clamp",
            ImageFit::Crop => "crop",
            ImageFit::Max => "max",
        }
    }
}

impl fmt::Display for ImageFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFit {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFit::ALL
            .into_iter()
            .find(|fit| fit.as_str() == s)
            .ok_or(ParamError::InvalidFit)
    }
}

/// Optional resize/quality parameters attached to a proxied image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<ImageFit>,
}

impl TransformParams {
    pub fn is_empty(&self) -> bool {
        self.w.is_none() && self.h.is_none() && self.q.is_none() && self.fit.is_none()
    }

    /// Check every present field against its range and return a validated copy.
    pub fn normalize(&self) -> Result<Self, ParamError> {
        Ok(Self {
            w: check_range(self.w, "w", MIN_DIMENSION, MAX_DIMENSION)?,
            h: check_range(self.h, "h", MIN_DIMENSION, MAX_DIMENSION)?,
            q: check_range(self.q, "q", MIN_QUALITY, MAX_QUALITY)?,
            fit: self.fit,
        })
    }

    /// Parse raw query-string values.
    ///
    /// An empty numeric value counts as absent. An empty `fit` does not: it is
    /// present and names no known mode.
    pub fn from_raw(
        w: Option<&str>,
        h: Option<&str>,
        q: Option<&str>,
        fit: Option<&str>,
    ) -> Result<Self, ParamError> {
        Ok(Self {
            w: parse_number_in_range(w, "w", MIN_DIMENSION, MAX_DIMENSION)?,
            h: parse_number_in_range(h, "h", MIN_DIMENSION, MAX_DIMENSION)?,
            q: parse_number_in_range(q, "q", MIN_QUALITY, MAX_QUALITY)?,
            fit: fit.map(str::parse::<ImageFit>).transpose()?,
        })
    }
}

fn check_range(
    value: Option<u32>,
    field: &'static str,
    min: u32,
    max: u32,
) -> Result<Option<u32>, ParamError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ParamError::OutOfRange { field, min, max }),
        other => Ok(other),
    }
}

fn parse_number_in_range(
    raw: Option<&str>,
    field: &'static str,
    min: u32,
    max: u32,
) -> Result<Option<u32>, ParamError> {
    let raw = match raw {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParamError::NotInteger(field));
    }
    // Digits only, so the only parse failure left is overflow.
    let value: u32 = raw
        .parse()
        .map_err(|_| ParamError::OutOfRange { field, min, max })?;
    check_range(Some(value), field, min, max)
}
