use anyhow::{Context, Result};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use std::path::Path;

use super::ThumbCreator;

/// Raster images decoded with the `image` crate, EXIF orientation applied.
pub struct ImageCreator;

impl ImageCreator {
    pub const MIME_TYPES: &'static [&'static str] = &[
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/bmp",
        "image/tiff",
        "image/x-icon",
        "image/x-tga",
        "image/x-portable-anymap",
    ];
}

impl ThumbCreator for ImageCreator {
    fn create(&self, path: &Path, _width: u32, _height: u32) -> Result<RgbaImage> {
        let mut decoder = ImageReader::open(path)
            .with_context(|| format!("open {}", path.display()))?
            .with_guessed_format()?
            .into_decoder()
            .context("unsupported image")?;
        let orientation = decoder.orientation()?;
        let mut img = DynamicImage::from_decoder(decoder).context("decode failed")?;
        img.apply_orientation(orientation);
        Ok(img.into_rgba8())
    }
}
