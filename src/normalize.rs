use image::{imageops, imageops::FilterType, GenericImageView, RgbImage};
use tracing::debug;

use crate::errors::{AnnotatorError, Result};
use crate::imageops_ai::SwapRedBlue;

/// Side length of the square frame the detector is fed.
pub const MODEL_INPUT_SIZE: u32 = 640;

/// Fixed-resolution, three-channel pixel buffer in BGR order.
///
/// Owned by a single pipeline invocation; the annotator draws into it in place
/// and the packager consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pixels: RgbImage,
    source_dimensions: (u32, u32),
}

impl NormalizedImage {
    /// Wraps a buffer whose channels are already in BGR order.
    pub const fn from_bgr(pixels: RgbImage, source_dimensions: (u32, u32)) -> Self {
        Self {
            pixels,
            source_dimensions,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Width and height of the image before resizing.
    pub const fn source_dimensions(&self) -> (u32, u32) {
        self.source_dimensions
    }

    pub const fn as_bgr(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn as_bgr_mut(&mut self) -> &mut RgbImage {
        &mut self.pixels
    }

    /// BGR channel triple at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel(x, y).0
    }

    /// Copy of the buffer in RGB order, for encoders that expect it.
    pub fn to_rgb(&self) -> RgbImage {
        self.pixels.clone().swap_red_blue()
    }
}

/// Decodes `raw` and resizes it to the model's fixed input resolution.
pub fn normalize(raw: &[u8]) -> Result<NormalizedImage> {
    normalize_to(raw, MODEL_INPUT_SIZE)
}

/// Decode, force three channels, stretch to `size`x`size` and reorder to BGR.
///
/// The resize does not preserve aspect ratio, so detections are expressed in
/// the resized frame.
pub fn normalize_to(raw: &[u8], size: u32) -> Result<NormalizedImage> {
    let decoded = image::load_from_memory(raw).map_err(|source| AnnotatorError::Decode { source })?;
    let source_dimensions = decoded.dimensions();
    debug!(
        "decoded {}x{} image ({:?})",
        source_dimensions.0,
        source_dimensions.1,
        decoded.color()
    );

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::CatmullRom);

    Ok(NormalizedImage::from_bgr(
        resized.swap_red_blue(),
        source_dimensions,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_output_is_fixed_size() -> Result<()> {
        for (w, h) in [(100, 100), (1920, 1080), (33, 500), (1, 1)] {
            let bytes = encode(
                DynamicImage::ImageRgb8(RgbImage::new(w, h)),
                ImageFormat::Png,
            );
            let img = normalize(&bytes)?;
            assert_eq!(img.dimensions(), (640, 640));
            assert_eq!(img.as_bgr().as_raw().len(), 640 * 640 * 3);
            assert_eq!(img.source_dimensions(), (w, h));
        }
        Ok(())
    }

    #[test]
    fn test_channel_order_is_bgr() -> Result<()> {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]))),
            ImageFormat::Png,
        );
        let img = normalize(&bytes)?;
        assert_eq!(img.pixel(320, 320), [50, 100, 200]);
        assert_eq!(img.to_rgb().get_pixel(0, 0).0, [200, 100, 50]);
        Ok(())
    }

    #[test]
    fn test_grayscale_becomes_three_channels() -> Result<()> {
        let bytes = encode(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([77]))),
            ImageFormat::Png,
        );
        let img = normalize(&bytes)?;
        assert_eq!(img.pixel(0, 0), [77, 77, 77]);
        Ok(())
    }

    #[test]
    fn test_alpha_is_discarded() -> Result<()> {
        let bytes = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 0]))),
            ImageFormat::Png,
        );
        let img = normalize(&bytes)?;
        assert_eq!(img.pixel(5, 5), [3, 2, 1]);
        Ok(())
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = normalize(b"<html>not an image</html>").unwrap_err();
        assert!(matches!(err, AnnotatorError::Decode { .. }));
        assert!(matches!(normalize(&[]), Err(AnnotatorError::Decode { .. })));
    }
}
