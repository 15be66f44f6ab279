use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ledgerlens_core::ImageConfig;
use thiserror::Error;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Not a recognizable image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { max_width: 768, max_height: 768, jpeg_quality: 85 }
    }
}

impl From<&ImageConfig> for NormalizeOptions {
    fn from(config: &ImageConfig) -> Self {
        Self {
            max_width: config.max_width,
            max_height: config.max_height,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// A compact RGB JPEG ready to send to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    /// The uploaded file's name, unchanged.
    pub filename: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Decode `data`, flatten it to 8-bit RGB, shrink it into the bounding box and
/// re-encode as JPEG. Images already inside the box keep their size.
pub fn normalize_image(
    data: &[u8],
    filename: &str,
    options: &NormalizeOptions,
) -> Result<NormalizedImage, PreprocessError> {
    let img = image::load_from_memory(data).map_err(PreprocessError::Decode)?;
    let rgb = to_rgb8(fit_within(img, options.max_width, options.max_height));
    let (width, height) = rgb.dimensions();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, options.jpeg_quality.clamp(1, 100));
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(PreprocessError::Encode)?;

    Ok(NormalizedImage {
        bytes,
        filename: filename.to_string(),
        mime_type: JPEG_MIME,
        width,
        height,
    })
}

/// Downscale (Lanczos3) so the image fits the box, preserving aspect ratio.
fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if img.width() <= max_width && img.height() <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

/// Alpha is dropped; grayscale, 16-bit and float buffers are converted.
fn to_rgb8(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}
