//! Resizing and JPEG re-encoding of downloaded images.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageResult};

use super::ImageConfig;

/// Shrink an image to fit the configured box and re-encode it as JPEG.
///
/// Aspect ratio is preserved and images already inside the box keep their
/// size. Transparency is flattened because JPEG has no alpha channel.
pub fn optimise(bytes: &[u8], config: &ImageConfig) -> ImageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let fitted = fit_within(decoded, config.max_width, config.max_height);
    let rgb = fitted.to_rgb8();
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, config.jpeg_quality);
    rgb.write_with_encoder(encoder)?;
    Ok(encoded)
}

fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        image
    } else {
        image.resize(max_width, max_height, FilterType::Lanczos3)
    }
}
