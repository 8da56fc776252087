// src/pipeline/steps/raster.rs

//! Raster image steps: PNG/JPEG recompression and WebP conversion.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::Step;

/// Recompress PNG (lossless, oxipng) and JPEG (re-encoded at
/// `jpeg_quality`) files. Other files pass through untouched.
///
/// The recompressed bytes replace the original only when they are smaller.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptimizeStep {
    /// oxipng preset, 0 (fast) to 6 (smallest).
    pub png_level: u8,
    pub jpeg_quality: u8,
}

impl Step for ImageOptimizeStep {
    fn name(&self) -> &str {
        "image_optimize"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let optimized = match format_of(&file) {
            Some(ImageFormat::Png) => optimize_png(&file.contents, self.png_level)?,
            Some(ImageFormat::Jpeg) => reencode_jpeg(&file.contents, self.jpeg_quality)?,
            _ => return Ok(file),
        };

        if optimized.len() < file.contents.len() {
            debug!(
                file = ?file.relative,
                before = file.contents.len(),
                after = optimized.len(),
                "image recompressed"
            );
            file.contents = optimized;
        }
        Ok(file)
    }
}

/// Convert PNG and JPEG files to lossless WebP, renaming them to `.webp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpStep;

impl Step for WebpStep {
    fn name(&self) -> &str {
        "webp"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let Some(format @ (ImageFormat::Png | ImageFormat::Jpeg)) = format_of(&file) else {
            return Ok(file);
        };

        let img = image::load_from_memory_with_format(&file.contents, format)
            .with_context(|| format!("cannot decode {:?}", file.source))?;
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());

        let mut out = Cursor::new(Vec::new());
        rgba.write_to(&mut out, ImageFormat::WebP)
            .context("webp encoding failed")?;

        file.contents = out.into_inner();
        file.set_extension("webp");
        Ok(file)
    }
}

fn format_of(file: &AssetFile) -> Option<ImageFormat> {
    ImageFormat::from_extension(file.extension()?)
}

fn optimize_png(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let options = oxipng::Options::from_preset(level.min(6));
    oxipng::optimize_from_memory(data, &options).map_err(|e| anyhow!("png optimization failed: {e}"))
}

fn reencode_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .context("cannot decode jpeg")?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)))
        .context("jpeg encoding failed")?;
    Ok(out)
}
