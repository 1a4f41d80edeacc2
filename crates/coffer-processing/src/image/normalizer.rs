//! Decode, bound and re-encode uploaded images.
//!
//! Output is always JPEG (quality 85) or PNG. Images larger than
//! [`MAX_IMAGE_DIMENSION`] on either side are shrunk to fit, keeping their
//! aspect ratio. Smaller images are never upscaled.

use std::io::Cursor;
use std::path::Path;

use coffer_core::constants::{JPEG_QUALITY, MAX_IMAGE_DIMENSION};
use coffer_core::AppError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::classifier::ImageKind;

/// Re-encoded image ready to be stored.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Target size of a `width` x `height` image bounded by `max` on both sides.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max);
    (w, h)
}

/// Decode `data`, shrink it if needed and re-encode it.
///
/// PNG stays PNG. JPEG, GIF (first frame) and anything else become JPEG.
pub fn normalize(data: &[u8], kind: ImageKind) -> Result<NormalizedImage, AppError> {
    let format = match kind {
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Gif => ImageFormat::Gif,
    };

    let img = image::load_from_memory_with_format(data, format).map_err(|e| {
        tracing::debug!(error = %e, "Image decode failed");
        AppError::ImageProcessing("failed to decode image".to_string())
    })?;

    let (orig_width, orig_height) = img.dimensions();
    let (width, height) = fit_within(orig_width, orig_height, MAX_IMAGE_DIMENSION);
    let img = if (width, height) != (orig_width, orig_height) {
        tracing::debug!(
            from_width = orig_width,
            from_height = orig_height,
            to_width = width,
            to_height = height,
            "Resizing image"
        );
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    let (data, mime_type) = match kind {
        ImageKind::Png => (encode_png(&img)?, "image/png"),
        ImageKind::Jpeg | ImageKind::Gif => (encode_jpeg(&img)?, "image/jpeg"),
    };

    Ok(NormalizedImage {
        data,
        mime_type,
        width,
        height,
    })
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| AppError::ImageProcessing(format!("failed to encode image: {}", e)))?;
    Ok(buffer)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| AppError::ImageProcessing(format!("failed to encode image: {}", e)))?;
    Ok(buffer)
}

/// Stored file extension for a normalized MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    if mime_type == "image/png" {
        "png"
    } else {
        "jpg"
    }
}

/// Width and height of the image at `path`, reading only its header.
pub fn dimensions_of(path: &Path) -> Option<(u32, u32)> {
    image::image_dimensions(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::{ErrorKind, ErrorMetadata};
    use image::{Rgba, RgbaImage};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 120, 200, 255]),
        ));
        let img = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            img
        };
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(800, 600, 2048), (800, 600));
        assert_eq!(fit_within(2048, 2048, 2048), (2048, 2048));
        assert_eq!(fit_within(4096, 2048, 2048), (2048, 1024));
        assert_eq!(fit_within(3000, 4000, 2048), (1536, 2048));
        assert_eq!(fit_within(10000, 2, 2048), (2048, 1));
    }

    #[test]
    fn test_large_png_is_bounded() {
        let data = encoded(3000, 1500, ImageFormat::Png);
        let out = normalize(&data, ImageKind::Png).unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert_eq!((out.width, out.height), (2048, 1024));

        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (2048, 1024));
    }

    #[test]
    fn test_small_image_not_upscaled() {
        let data = encoded(64, 32, ImageFormat::Jpeg);
        let out = normalize(&data, ImageKind::Jpeg).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!((out.width, out.height), (64, 32));
    }

    #[test]
    fn test_gif_becomes_jpeg() {
        let data = encoded(40, 20, ImageFormat::Gif);
        let out = normalize(&data, ImageKind::Gif).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(&out.data[..3], b"\xFF\xD8\xFF");
        assert_eq!(extension_for(out.mime_type), "jpg");
    }

    #[test]
    fn test_undecodable_image() {
        let err = normalize(b"\x89PNG\r\n\x1a\ngarbage", ImageKind::Png).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.client_message(), "failed to decode image");
    }

    #[test]
    fn test_dimensions_of() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, encoded(12, 7, ImageFormat::Png)).unwrap();
        assert_eq!(dimensions_of(&path), Some((12, 7)));

        let text = dir.path().join("b.txt");
        std::fs::write(&text, b"not an image").unwrap();
        assert_eq!(dimensions_of(&text), None);
        assert_eq!(dimensions_of(&dir.path().join("missing.png")), None);
    }
}
