use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use super::{ArtifactFetcher, ArtifactStorage};
use crate::error::StorageError;

const OCTET_STREAM: &str = "application/octet-stream";

/// A provider output, classified by its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactPayload {
    /// `http://` or `https://` reference to fetch.
    Remote(String),
    /// Base64 content carried in the response itself.
    Inline {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

impl ArtifactPayload {
    /// Classifies a raw provider payload.
    ///
    /// URLs win regardless of length. Anything else must be longer than
    /// `inline_threshold` to be decoded as base64 (plain or `data:` URI).
    pub fn classify(raw: &str, inline_threshold: usize) -> Result<Self, StorageError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Self::Remote(trimmed.to_string()));
        }

        if trimmed.len() <= inline_threshold {
            return Err(StorageError::UnrecognizedPayload { len: trimmed.len() });
        }

        let (content_type, encoded) = match trimmed.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest
                    .split_once(',')
                    .ok_or_else(|| StorageError::InvalidInline("data URI without ','".into()))?;
                let media_type = header.strip_suffix(";base64").ok_or_else(|| {
                    StorageError::InvalidInline("data URI is not base64 encoded".into())
                })?;
                let media_type = (!media_type.is_empty()).then(|| media_type.to_string());
                (media_type, data)
            }
            None => (None, trimmed),
        };

        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| StorageError::InvalidInline(e.to_string()))?;

        let content_type = content_type.or_else(|| sniff_content_type(&bytes));
        Ok(Self::Inline {
            bytes,
            content_type,
        })
    }
}

/// Recognizes the media types providers actually return.
fn sniff_content_type(bytes: &[u8]) -> Option<String> {
    let kind = if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        "video/mp4"
    } else {
        return None;
    };
    Some(kind.to_string())
}

fn extension_for(content_type: &str, source_url: Option<&str>) -> String {
    if let Some(ext) = source_url.and_then(url_extension) {
        return ext;
    }
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Copies provider outputs into [`ArtifactStorage`].
#[derive(Clone)]
pub struct ArtifactPersister {
    fetcher: Arc<dyn ArtifactFetcher>,
    storage: Arc<dyn ArtifactStorage>,
    inline_threshold: usize,
}

impl ArtifactPersister {
    pub fn new(
        fetcher: Arc<dyn ArtifactFetcher>,
        storage: Arc<dyn ArtifactStorage>,
        inline_threshold: usize,
    ) -> Self {
        Self {
            fetcher,
            storage,
            inline_threshold,
        }
    }

    /// Persists one payload and returns the durable URL.
    pub async fn persist(&self, raw: &str) -> Result<String, StorageError> {
        match ArtifactPayload::classify(raw, self.inline_threshold)? {
            ArtifactPayload::Remote(url) => {
                let fetched = self.fetcher.fetch(&url).await?;
                let content_type = fetched
                    .content_type
                    .or_else(|| {
                        mime_guess::from_path(url.split('?').next().unwrap_or(&url))
                            .first()
                            .map(|m| m.essence_str().to_string())
                    })
                    .unwrap_or_else(|| OCTET_STREAM.to_string());
                let filename = format!(
                    "{}.{}",
                    Uuid::new_v4(),
                    extension_for(&content_type, Some(&url))
                );
                self.storage
                    .upload(fetched.bytes, &filename, &content_type)
                    .await
            }
            ArtifactPayload::Inline {
                bytes,
                content_type,
            } => {
                let content_type = content_type.unwrap_or_else(|| OCTET_STREAM.to_string());
                let filename = format!("{}.{}", Uuid::new_v4(), extension_for(&content_type, None));
                self.storage.upload(bytes, &filename, &content_type).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_base64() -> String {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend(std::iter::repeat(0u8).take(120));
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_url_is_remote_regardless_of_length() {
        let payload = ArtifactPayload::classify("https://x.io/a.png", 100).unwrap();
        assert_eq!(payload, ArtifactPayload::Remote("https://x.io/a.png".into()));
    }

    #[test]
    fn test_long_base64_is_inline() {
        let payload = ArtifactPayload::classify(&png_base64(), 100).unwrap();
        match payload {
            ArtifactPayload::Inline {
                bytes,
                content_type,
            } => {
                assert!(bytes.starts_with(b"\x89PNG"));
                assert_eq!(content_type.as_deref(), Some("image/png"));
            }
            other => panic!("expected inline payload, got {other:?}"),
        }
    }

    #[test]
    fn test_data_uri_carries_content_type() {
        let raw = format!("data:image/webp;base64,{}", png_base64());
        match ArtifactPayload::classify(&raw, 100).unwrap() {
            ArtifactPayload::Inline { content_type, .. } => {
                assert_eq!(content_type.as_deref(), Some("image/webp"));
            }
            other => panic!("expected inline payload, got {other:?}"),
        }
    }

    #[test]
    fn test_short_payload_is_unrecognized() {
        let err = ArtifactPayload::classify("abc", 100).unwrap_err();
        assert!(matches!(err, StorageError::UnrecognizedPayload { len: 3 }));
    }

    #[test]
    fn test_invalid_base64() {
        let raw = "!".repeat(150);
        assert!(matches!(
            ArtifactPayload::classify(&raw, 100),
            Err(StorageError::InvalidInline(_))
        ));
    }

    #[test]
    fn test_extension_prefers_url() {
        assert_eq!(
            extension_for("video/mp4", Some("https://p.io/v/out.MOV?sig=1")),
            "mov"
        );
        assert_eq!(extension_for("image/png", None), "png");
        assert_eq!(extension_for("application/x-unknown-thing", None), "bin");
    }
}
