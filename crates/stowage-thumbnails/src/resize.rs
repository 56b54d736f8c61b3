//! Decode, scale, re-encode

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use stowage_core::{StowError, StowResult};

use crate::spec::ThumbnailSpec;

pub const JPEG_QUALITY: u8 = 95;

/// An encoded thumbnail
#[derive(Debug, Clone)]
pub struct Resized {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
}

/// Produces thumbnails from source image bytes.
///
/// Synchronous and CPU bound; callers run it on the blocking pool.
pub trait Resizer: Send + Sync {
    fn resize(&self, source: &[u8], spec: &ThumbnailSpec) -> StowResult<Resized>;
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Png,
    Jpeg,
}

impl Target {
    /// PNG stays PNG; JPEG and GIF become JPEG
    fn for_source(format: ImageFormat) -> StowResult<Self> {
        match format {
            ImageFormat::Png => Ok(Target::Png),
            ImageFormat::Jpeg | ImageFormat::Gif => Ok(Target::Jpeg),
            other => Err(StowError::Encode(format!(
                "no thumbnail encoding for {other:?} images"
            ))),
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Target::Png => "image/png",
            Target::Jpeg => "image/jpeg",
        }
    }
}

/// [`Resizer`] backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageResizer {
    filter: FilterType,
    jpeg_quality: u8,
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl ImageResizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn encode(&self, img: &DynamicImage, target: Target) -> StowResult<Vec<u8>> {
        let mut data = Vec::new();
        let result = match target {
            Target::Png => img.write_with_encoder(PngEncoder::new(Cursor::new(&mut data))),
            Target::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(
                JpegEncoder::new_with_quality(Cursor::new(&mut data), self.jpeg_quality),
            ),
        };
        result.map_err(|e| StowError::Encode(e.to_string()))?;
        Ok(data)
    }
}

impl Resizer for ImageResizer {
    fn resize(&self, source: &[u8], spec: &ThumbnailSpec) -> StowResult<Resized> {
        let format = image::guess_format(source).map_err(|e| StowError::Decode(e.to_string()))?;
        let target = Target::for_source(format)?;
        let img = image::load_from_memory_with_format(source, format)
            .map_err(|e| StowError::Decode(e.to_string()))?;

        let (width, height) = spec.target_size(img.width(), img.height());
        let img = if (width, height) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(width, height, self.filter)
        };

        Ok(Resized {
            data: self.encode(&img, target)?,
            width,
            height,
            content_type: target.content_type(),
        })
    }
}
