//! Image encoding: `DynamicImage` → PNG data URL, and data URL → `ImageData`.
//!
//! Pages travel through the pipeline as `data:` URLs because that is the form
//! the OCR back-ends and the output JSON both want. The vision provider wants
//! bare base64 plus a MIME type, so [`image_data_from_url`] splits them again
//! at the last moment. PNG is lossless, which matters more for text crispness
//! than payload size.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap raw bytes as `data:{mime};base64,…`.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    format!("data:{mime_type};base64,{b64}")
}

/// Encode a rendered page straight to a PNG data URL.
pub fn png_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    Ok(to_data_url("image/png", &encode_png(img)?))
}

/// Split a base64 data URL into `(mime_type, payload)`.
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((if mime.is_empty() { "application/octet-stream" } else { mime }, payload))
}

/// Convert a page data URL into the provider's image attachment.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// squeezing it into one low-resolution overview, which loses fine print.
pub fn image_data_from_url(url: &str) -> Option<ImageData> {
    let (mime, payload) = split_data_url(url)?;
    Some(ImageData::new(payload.to_string(), mime).with_detail("high"))
}
