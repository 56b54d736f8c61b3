//! Image served when a thumbnail cannot be produced

use std::io::Cursor;
use std::path::PathBuf;

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, Rgba, RgbaImage};
use tokio::sync::OnceCell;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackBody {
    pub data: Bytes,
    pub content_type: String,
}

/// Loaded once, on first use, from an optional path.
///
/// A missing or unreadable file degrades to a built-in 1x1 PNG.
#[derive(Debug, Default)]
pub struct FallbackImage {
    path: Option<PathBuf>,
    body: OnceCell<FallbackBody>,
}

impl FallbackImage {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            body: OnceCell::new(),
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            path: None,
            body: OnceCell::new_with(Some(FallbackBody {
                data: data.into(),
                content_type: content_type.into(),
            })),
        }
    }

    pub async fn body(&self) -> FallbackBody {
        self.body.get_or_init(|| self.load()).await.clone()
    }

    async fn load(&self) -> FallbackBody {
        let Some(path) = &self.path else {
            return placeholder();
        };
        match tokio::fs::read(path).await {
            Ok(data) => FallbackBody {
                data: Bytes::from(data),
                content_type: mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .to_string(),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read default thumbnail, using placeholder");
                placeholder()
            }
        }
    }
}

fn placeholder() -> FallbackBody {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
    let mut data = Vec::new();
    if let Err(e) = img.write_with_encoder(PngEncoder::new(Cursor::new(&mut data))) {
        warn!(error = %e, "Failed to encode placeholder image");
        data.clear();
    }
    FallbackBody {
        data: Bytes::from(data),
        content_type: "image/png".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_without_path() {
        let body = FallbackImage::new(None).body().await;
        assert_eq!(body.content_type, "image/png");

        let img = image::load_from_memory(&body.data).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[tokio::test]
    async fn test_loads_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.jpg");
        std::fs::write(&path, b"first").unwrap();

        let fallback = FallbackImage::new(Some(path.clone()));
        let first = fallback.body().await;
        assert_eq!(first.data, Bytes::from_static(b"first"));
        assert_eq!(first.content_type, "image/jpeg");

        std::fs::write(&path, b"second").unwrap();
        assert_eq!(fallback.body().await, first);
    }

    #[tokio::test]
    async fn test_unreadable_path_uses_placeholder() {
        let fallback = FallbackImage::new(Some(PathBuf::from("/nonexistent/default.png")));
        let body = fallback.body().await;
        assert_eq!(body.content_type, "image/png");
        assert!(!body.data.is_empty());
    }

    #[tokio::test]
    async fn test_from_bytes() {
        let fallback = FallbackImage::from_bytes(&b"gif89a"[..], "image/gif");
        let body = fallback.body().await;
        assert_eq!(body.data, Bytes::from_static(b"gif89a"));
        assert_eq!(body.content_type, "image/gif");
    }
}
