//! Image encoding: rendered pages and image files → [`PageImage`].
//!
//! Rendered PDF pages are PNG-encoded: lossless compression keeps small print
//! legible for the model. Image documents are sent as-is, base64-wrapped,
//! with their MIME type sniffed from the bytes rather than trusted from the
//! file name.

use crate::error::DocumentError;
use crate::model::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Image formats accepted as documents.
pub const SUPPORTED_IMAGE_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(PageImage {
        mime_type: ImageFormat::Png.to_mime_type().to_string(),
        data: b64,
    })
}

/// Detect a supported image format from magic bytes.
pub fn sniff_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .filter(|f| SUPPORTED_IMAGE_FORMATS.contains(f))
}

/// Wrap an image file as a single [`PageImage`].
pub fn load_image(bytes: &[u8]) -> Result<PageImage, DocumentError> {
    let format = sniff_image_format(bytes).ok_or_else(|| DocumentError::ConversionFailed {
        detail: "not a PNG, JPEG or WebP image".to_string(),
    })?;
    Ok(PageImage {
        mime_type: format.to_mime_type().to_string(),
        data: STANDARD.encode(bytes),
    })
}
