//! Input resolution: turn base64 payloads, local paths or URLs into a
//! [`DocumentInput`] held in memory.
//!
//! Uploads arrive from the request layer as base64 with a client-declared
//! MIME type that is often missing or generic (`application/octet-stream`).
//! We sniff magic bytes in that case so PDFs and images are routed correctly.

use crate::error::DocExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PDF_MIME: &str = "application/pdf";

/// A document held in memory, ready for extraction.
#[derive(Clone)]
pub struct DocumentInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl std::fmt::Debug for DocumentInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentInput")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// What the rasteriser should do with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentInput {
    /// Wrap raw bytes; a missing or generic MIME type is sniffed from the content.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        let declared = mime_type.into();
        let mime_type = if declared.is_empty() || declared == "application/octet-stream" {
            sniff_mime(&bytes).unwrap_or(declared.as_str()).to_string()
        } else {
            declared
        };
        Self {
            bytes,
            mime_type,
            file_name: file_name.into(),
        }
    }

    /// Decode a base64 upload. A `data:` URL prefix is accepted and ignored.
    pub fn from_base64(
        b64: &str,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<Self, DocExtractError> {
        let file_name = file_name.into();
        let payload = match b64.split_once(";base64,") {
            Some((_, payload)) if b64.starts_with("data:") => payload,
            _ => b64,
        };
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| DocExtractError::InvalidBase64 {
                file_name: file_name.clone(),
                detail: e.to_string(),
            })?;
        Ok(Self::new(bytes, mime_type, file_name))
    }

    /// Read a local file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, DocExtractError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocExtractError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => DocExtractError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DocExtractError::Internal(format!("reading {}: {e}", path.display())),
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime = sniff_mime(&bytes).unwrap_or("application/octet-stream");
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::new(bytes, mime, file_name))
    }

    /// Download a document over HTTP(S).
    pub async fn from_url(url: &str, timeout_secs: u64) -> Result<Self, DocExtractError> {
        info!("Downloading document from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DocExtractError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                DocExtractError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(DocExtractError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DocExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!("Downloaded {} bytes", bytes.len());
        Ok(Self::new(bytes.to_vec(), declared, file_name_from_url(url)))
    }

    /// Resolve a path or URL.
    pub async fn resolve(input: &str, timeout_secs: u64) -> Result<Self, DocExtractError> {
        if input.trim().is_empty() {
            return Err(DocExtractError::InvalidInput {
                input: input.to_string(),
            });
        }
        if is_url(input) {
            Self::from_url(input, timeout_secs).await
        } else {
            Self::from_path(PathBuf::from(input)).await
        }
    }

    /// Route by MIME type: PDFs are rasterised, images are used as-is.
    pub fn kind(&self) -> Result<DocumentKind, DocExtractError> {
        if self.mime_type == PDF_MIME {
            Ok(DocumentKind::Pdf)
        } else if self.mime_type.starts_with("image/") {
            Ok(DocumentKind::Image)
        } else {
            Err(DocExtractError::UnsupportedMediaType {
                file_name: self.file_name.clone(),
                mime_type: self.mime_type.clone(),
            })
        }
    }

    /// Payload as base64, for back-ends that take the whole document.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Guess a MIME type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        return Some(PDF_MIME);
    }
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Tiff => Some("image/tiff"),
        image::ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

fn file_name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "downloaded".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniffs_pdf_and_png() {
        assert_eq!(sniff_mime(b"%PDF-1.7\n"), Some(PDF_MIME));
        assert_eq!(
            sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]),
            Some("image/png")
        );
        assert_eq!(sniff_mime(b"hello"), None);
    }

    #[test]
    fn generic_mime_is_replaced_by_sniffed_one() {
        let doc = DocumentInput::new(b"%PDF-1.4".to_vec(), "application/octet-stream", "a.bin");
        assert_eq!(doc.kind().unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn from_base64_accepts_data_url_prefix() {
        let doc = DocumentInput::from_base64("data:application/pdf;base64,JVBERi0xLjQ=", "", "x.pdf")
            .unwrap();
        assert_eq!(doc.bytes, b"%PDF-1.4");
        assert_eq!(doc.mime_type, PDF_MIME);
    }

    #[test]
    fn invalid_base64_is_reported() {
        let err = DocumentInput::from_base64("@@not base64@@", "application/pdf", "x.pdf").unwrap_err();
        assert!(matches!(err, DocExtractError::InvalidBase64 { .. }));
    }

    #[test]
    fn unsupported_media_type() {
        let doc = DocumentInput::new(b"plain text".to_vec(), "text/plain", "notes.txt");
        assert!(matches!(
            doc.kind(),
            Err(DocExtractError::UnsupportedMediaType { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = DocumentInput::from_path("/definitely/not/here.pdf").await.unwrap_err();
        assert!(matches!(err, DocExtractError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.5 minimal").unwrap();
        let doc = DocumentInput::from_path(&path).await.unwrap();
        assert_eq!(doc.file_name, "scan.pdf");
        assert_eq!(doc.kind().unwrap(), DocumentKind::Pdf);
    }
}
