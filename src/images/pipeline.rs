//! Upload validation and resizing
//!
//! Decoding and resizing are CPU-bound, so [`ImagePipeline::process`] runs
//! them on the blocking pool.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::config::{ImageVariantConfig, ImagesConfig, ResizeMode};
use crate::core::error::{ApiError, ImageError, Result};

/// Content type of every stored variant
pub const VARIANT_CONTENT_TYPE: &str = "image/jpeg";

/// One encoded rendition of an upload
#[derive(Debug, Clone)]
pub struct RenderedVariant {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ImagePipeline {
    config: ImagesConfig,
}

impl ImagePipeline {
    pub fn new(config: ImagesConfig) -> Self {
        Self { config }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    /// Check the declared type, the size and the sniffed format of an upload
    pub fn validate(&self, content_type: Option<&str>, bytes: &[u8]) -> Result<ImageFormat> {
        let declared = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !self.accepts(&declared) {
            let shown = if declared.is_empty() { "none" } else { &declared };
            return Err(ImageError::UnsupportedType(shown.to_string()).into());
        }

        if bytes.len() > self.config.max_upload_bytes {
            return Err(ImageError::TooLarge {
                limit: self.config.max_upload_bytes,
            }
            .into());
        }

        let format = image::guess_format(bytes)
            .map_err(|_| ImageError::UnsupportedType(format!("{declared} (unrecognised data)")))?;
        let sniffed = format.to_mime_type();
        if sniffed != declared || !self.accepts(sniffed) {
            return Err(ImageError::UnsupportedType(format!(
                "{declared} (data is {sniffed})"
            ))
            .into());
        }

        Ok(format)
    }

    fn accepts(&self, content_type: &str) -> bool {
        self.config.accepted_types.iter().any(|t| t == content_type)
    }

    /// Decode and render every configured variant
    pub async fn process(&self, bytes: Vec<u8>) -> Result<Vec<RenderedVariant>> {
        let variants = self.config.variants.clone();
        let quality = self.config.jpeg_quality;

        tokio::task::spawn_blocking(move || render_all(&bytes, &variants, quality))
            .await
            .map_err(|e| ApiError::internal(format!("image worker failed: {e}")))?
    }
}

fn render_all(
    bytes: &[u8],
    variants: &[ImageVariantConfig],
    quality: u8,
) -> Result<Vec<RenderedVariant>> {
    let source = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;

    variants
        .iter()
        .map(|variant| {
            let resized = resize(&source, variant);
            let rgb = resized.to_rgb8();

            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, quality)
                .encode_image(&rgb)
                .map_err(|e| ApiError::internal(format!("jpeg encoding failed: {e}")))?;

            Ok(RenderedVariant {
                name: variant.name.clone(),
                width: rgb.width(),
                height: rgb.height(),
                bytes: out,
            })
        })
        .collect()
}

fn resize(source: &DynamicImage, variant: &ImageVariantConfig) -> DynamicImage {
    match variant.mode {
        ResizeMode::Fill => {
            source.resize_to_fill(variant.width, variant.height, FilterType::Lanczos3)
        }
        // Fit never upscales
        ResizeMode::Fit if source.width() <= variant.width && source.height() <= variant.height => {
            source.clone()
        }
        ResizeMode::Fit => source.resize(variant.width, variant.height, FilterType::Lanczos3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn pipeline() -> ImagePipeline {
        ImagePipeline::new(ImagesConfig::default())
    }

    #[test]
    fn test_validate_accepts_matching_png() {
        let bytes = png(10, 10);
        let format = pipeline().validate(Some("image/png"), &bytes).unwrap();
        assert_eq!(format, ImageFormat::Png);
    }

    #[test]
    fn test_validate_rejects_bad_declarations() {
        let bytes = png(10, 10);

        let err = pipeline().validate(None, &bytes).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_IMAGE_TYPE");

        let err = pipeline().validate(Some("text/plain"), &bytes).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_IMAGE_TYPE");

        // Declared jpeg, actually png
        let err = pipeline().validate(Some("image/jpeg"), &bytes).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_IMAGE_TYPE");

        let err = pipeline()
            .validate(Some("image/png"), b"definitely not an image")
            .unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_IMAGE_TYPE");
    }

    #[test]
    fn test_validate_enforces_size_limit() {
        let pipeline = ImagePipeline::new(ImagesConfig {
            max_upload_bytes: 16,
            ..ImagesConfig::default()
        });
        let err = pipeline.validate(Some("image/png"), &png(10, 10)).unwrap_err();
        assert_eq!(err.error_code(), "IMAGE_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_process_renders_configured_variants() {
        let variants = pipeline().process(png(800, 400)).await.unwrap();
        let dims: Vec<(&str, u32, u32)> = variants
            .iter()
            .map(|v| (v.name.as_str(), v.width, v.height))
            .collect();

        assert_eq!(
            dims,
            vec![
                ("thumbnail", 150, 150),
                ("medium", 600, 300),
                // Smaller than the box: kept as is
                ("large", 800, 400),
            ]
        );
        for v in &variants {
            assert_eq!(image::guess_format(&v.bytes).unwrap(), ImageFormat::Jpeg);
        }
    }

    #[tokio::test]
    async fn test_truncated_data_fails_to_decode() {
        let mut bytes = png(50, 50);
        bytes.truncate(40);
        let err = pipeline().process(bytes).await.unwrap_err();
        assert_eq!(err.error_code(), "IMAGE_DECODE_FAILED");
    }
}
