use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Prefix that marks a payload as already being in canonical form.
pub const DATA_URI_PREFIX: &str = "data:image/";

/// MIME type assumed for bare base64 payloads returned by the service.
pub const DEFAULT_MIME: &str = "image/png";

/// Canonical `data:<mime>;base64,<payload>` string used for every image
/// regardless of source.
///
/// Syntactically well-formed by construction; payload validity is not
/// checked here. A renderer that fails to decode one substitutes its
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// Encode raw bytes into the canonical data URI. Deterministic.
    pub fn encode(bytes: &[u8], mime: &str) -> Self {
        Self(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bring a server-returned image payload into canonical form.
///
/// Total over its domain: absent or empty input maps to `None`, an already
/// prefixed image data URI passes through unchanged, and anything else is
/// treated as raw base64 and wrapped with the default MIME prefix. No
/// response shape makes this fail.
pub fn normalize(raw: Option<&str>) -> Option<EncodedImage> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with(DATA_URI_PREFIX) {
        Some(EncodedImage(raw.to_string()))
    } else {
        Some(EncodedImage(format!("data:{DEFAULT_MIME};base64,{raw}")))
    }
}
