//! PDF rasterisation: render every page to a PNG data URL via pdfium, or wrap
//! a single image as a one-page document.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state; calling it from async
//! code would stall a Tokio worker for the whole render. All pdfium work runs
//! on one blocking-pool thread, which also means pdfium never spins up worker
//! threads of its own.
//!
//! The `Pdfium` binding, the loaded document and each page bitmap are scoped
//! to [`render_pdf_blocking`], so they are released before it returns on both
//! the success and the error path.

use crate::config::ExtractionConfig;
use crate::error::DocExtractError;
use crate::output::Page;
use crate::pipeline::encode;
use crate::pipeline::input::{DocumentInput, DocumentKind};
use pdfium_render::prelude::*;
use std::io::Cursor;
use tracing::{debug, info};

/// Turn the input into pages ready for layout detection.
pub async fn prepare_pages(
    input: &DocumentInput,
    config: &ExtractionConfig,
) -> Result<Vec<Page>, DocExtractError> {
    match input.kind()? {
        DocumentKind::Pdf => render_pdf(input, config).await,
        DocumentKind::Image => Ok(vec![image_page(input)?]),
    }
}

/// Rasterise every page of a PDF.
pub async fn render_pdf(
    input: &DocumentInput,
    config: &ExtractionConfig,
) -> Result<Vec<Page>, DocExtractError> {
    let bytes = input.bytes.clone();
    let file_name = input.file_name.clone();
    let scale = config.render_scale;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        render_pdf_blocking(&bytes, &file_name, scale, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| DocExtractError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pdf_blocking(
    bytes: &[u8],
    file_name: &str,
    scale: f32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<Page>, DocExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                DocExtractError::WrongPassword {
                    file_name: file_name.to_string(),
                }
            } else {
                DocExtractError::PasswordRequired {
                    file_name: file_name.to_string(),
                }
            }
        } else {
            DocExtractError::CorruptPdf {
                file_name: file_name.to_string(),
                detail: err_str,
            }
        }
    })?;

    let page_count = document.pages().len() as usize;
    if page_count == 0 {
        return Err(DocExtractError::EmptyDocument {
            file_name: file_name.to_string(),
        });
    }
    info!("PDF loaded: {} pages", page_count);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut pages = Vec::with_capacity(page_count);
    for (idx, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocExtractError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let image = bitmap.as_image();
        let data_url =
            encode::png_data_url(&image).map_err(|e| DocExtractError::RasterisationFailed {
                page: idx + 1,
                detail: format!("PNG encoding failed: {}", e),
            })?;
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        pages.push(Page::new(idx, image.width(), image.height(), data_url));
    }

    Ok(pages)
}

/// Bind to pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system library.
fn bind_pdfium() -> Result<Pdfium, DocExtractError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DocExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Wrap a non-PDF image as a single page. Only the header is decoded.
pub fn image_page(input: &DocumentInput) -> Result<Page, DocExtractError> {
    let (width, height) = image::ImageReader::new(Cursor::new(&input.bytes))
        .with_guessed_format()
        .map_err(|e| DocExtractError::ImageDecodeFailed {
            file_name: input.file_name.clone(),
            detail: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| DocExtractError::ImageDecodeFailed {
            file_name: input.file_name.clone(),
            detail: e.to_string(),
        })?;

    let data_url = encode::to_data_url(&input.mime_type, &input.bytes);
    Ok(Page::new(0, width, height, data_url))
}
