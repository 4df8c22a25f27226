use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 1x1 transparent PNG, the canonical empty drawing surface.
const BLANK_DATA_URL: &str = "data:image/png;base64,\
iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("snapshot is not an image data URL")]
    NotADataUrl,
    #[error("snapshot data URL is not base64 encoded")]
    NotBase64,
    #[error("snapshot payload is not valid base64: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

/// An encoded raster of the full drawing surface at one instant, as produced
/// by `canvas.toDataURL()`. Opaque and immutable once created; the history
/// manager never looks inside it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    /// Validates the `data:image/<type>;base64,<payload>` shape without
    /// decoding the payload.
    pub fn from_data_url(url: impl Into<String>) -> Result<Self, SnapshotError> {
        let url = url.into();
        let rest = url
            .strip_prefix("data:image/")
            .ok_or(SnapshotError::NotADataUrl)?;
        let (_media, payload) = rest.split_once(',').ok_or(SnapshotError::NotADataUrl)?;
        if !rest[..rest.len() - payload.len() - 1].ends_with(";base64") {
            return Err(SnapshotError::NotBase64);
        }
        Ok(Self(url))
    }

    pub fn blank() -> Self {
        Self(BLANK_DATA_URL.to_string())
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    /// Media type between `data:` and the first `;`, e.g. `image/png`.
    pub fn media_type(&self) -> &str {
        let rest = &self.0["data:".len()..];
        rest.split(|c| c == ';' || c == ',').next().unwrap_or(rest)
    }

    /// Decodes the base64 payload into raw image bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = self
            .0
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or(SnapshotError::NotADataUrl)?;
        Ok(BASE64.decode(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canvas_style_data_url() {
        let snapshot = Snapshot::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(snapshot.media_type(), "image/png");
        assert_eq!(snapshot.decode_bytes().unwrap(), b"hello");
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert_eq!(
            Snapshot::from_data_url("data:text/plain;base64,aGk=").unwrap_err(),
            SnapshotError::NotADataUrl
        );
        assert_eq!(
            Snapshot::from_data_url("not a url").unwrap_err(),
            SnapshotError::NotADataUrl
        );
    }

    #[test]
    fn rejects_unencoded_data_url() {
        assert_eq!(
            Snapshot::from_data_url("data:image/svg+xml,<svg/>").unwrap_err(),
            SnapshotError::NotBase64
        );
    }

    #[test]
    fn blank_is_a_decodable_png() {
        let blank = Snapshot::blank();
        assert_eq!(blank.media_type(), "image/png");
        let bytes = blank.decode_bytes().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
