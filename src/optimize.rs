//! Per-picture recompression: downscale, then re-encode as JPEG under a
//! byte ceiling, or as PNG when the picture has transparency.

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};

use crate::config::defaults::{
    DEFAULT_MAX_HEIGHT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_WIDTH, DEFAULT_MIN_QUALITY,
    DEFAULT_QUALITY_STEP, DEFAULT_START_QUALITY,
};
use crate::error::OptimizeError;
use crate::model::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeOptions {
    /// Byte ceiling for JPEG output
    pub max_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            start_quality: DEFAULT_START_QUALITY,
            quality_step: DEFAULT_QUALITY_STEP,
            min_quality: DEFAULT_MIN_QUALITY,
        }
    }
}

/// Encoded picture bytes, not yet on disk
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub encoding: Encoding,
    pub width: u32,
    pub height: u32,
}

/// A recompressed picture written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedImage {
    pub path: PathBuf,
    pub encoding: Encoding,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Dimensions that fit inside `max_width` x `max_height` keeping the aspect
/// ratio, or `None` when the picture already fits
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }
    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    // Truncate, with slack for ratios like 0.6 that are not exact in binary
    let scale = |n: u32, max: u32| ((n as f64 * ratio + 1e-9) as u32).clamp(1, max);
    Some((scale(width, max_width), scale(height, max_height)))
}

fn encode_png(img: DynamicImage) -> Result<Vec<u8>, OptimizeError> {
    let img = match img {
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageRgba8(_) => img,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    };
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
    encoder.write_image(
        img.as_bytes(),
        img.width(),
        img.height(),
        img.color().into(),
    )?;
    Ok(buf)
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, OptimizeError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)?;
    Ok(buf)
}

/// Lower the JPEG quality until the output fits under the ceiling.
///
/// The last attempt is kept even when it is still too large.
fn encode_jpeg_within(img: &RgbImage, options: &OptimizeOptions) -> Result<(Vec<u8>, u8), OptimizeError> {
    let step = options.quality_step.max(1);
    let mut quality = options.start_quality.clamp(1, 100);

    loop {
        let bytes = encode_jpeg(img, quality)?;
        log::trace!("JPEG quality {} -> {} bytes", quality, bytes.len());
        if bytes.len() as u64 <= options.max_bytes || quality <= options.min_quality {
            return Ok((bytes, quality));
        }
        quality = quality.saturating_sub(step).max(options.min_quality).max(1);
    }
}

/// Downscale and re-encode a decoded picture
pub fn encode_optimized(img: DynamicImage, options: &OptimizeOptions) -> Result<EncodedImage, OptimizeError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(OptimizeError::EmptyImage);
    }

    let img = match fit_within(img.width(), img.height(), options.max_width, options.max_height) {
        Some((width, height)) => {
            log::debug!(
                "Resizing {}x{} to {}x{}",
                img.width(),
                img.height(),
                width,
                height
            );
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        None => img,
    };
    let (width, height) = (img.width(), img.height());

    if img.color().has_alpha() {
        return Ok(EncodedImage {
            bytes: encode_png(img)?,
            encoding: Encoding::Png,
            width,
            height,
        });
    }

    let (bytes, quality) = encode_jpeg_within(&img.to_rgb8(), options)?;
    Ok(EncodedImage {
        bytes,
        encoding: Encoding::Jpeg { quality },
        width,
        height,
    })
}

/// GIF always decodes to RGBA, even without a transparent palette entry
fn drop_opaque_alpha(img: DynamicImage, format: Option<ImageFormat>) -> DynamicImage {
    if format != Some(ImageFormat::Gif) || !img.color().has_alpha() {
        return img;
    }
    let opaque = match img.as_rgba8() {
        Some(rgba) => rgba.pixels().all(|p| p[3] == u8::MAX),
        None => img.to_rgba8().pixels().all(|p| p[3] == u8::MAX),
    };
    if opaque {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    }
}

/// Recompress the picture at `input` into `<output_stem>.jpg` or
/// `<output_stem>.png`
pub fn optimize_image(
    input: &Path,
    output_stem: &Path,
    options: &OptimizeOptions,
) -> Result<OptimizedImage, OptimizeError> {
    let data = fs::read(input)?;
    let img = drop_opaque_alpha(image::load_from_memory(&data)?, image::guess_format(&data).ok());
    let encoded = encode_optimized(img, options)?;

    let path = output_stem.with_extension(encoded.encoding.extension());
    fs::write(&path, &encoded.bytes)?;

    Ok(OptimizedImage {
        path,
        encoding: encoded.encoding,
        width: encoded.width,
        height: encoded.height,
        bytes: encoded.bytes.len() as u64,
    })
}
