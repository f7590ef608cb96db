//! Error types for the edgequake-docextract library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`DocExtractError`]: a whole stage cannot proceed (bad input, PDF that
//!   will not open, OCR back-end down, provider not configured). Returned as
//!   `Err` from the entry points in [`crate::extract`], or recorded as the
//!   status of one pipeline inside [`crate::output::ExtractionOutput`].
//!
//! * [`CallError`]: a single vision-model call failed. It is classified
//!   (rate limit or not), fed to the concurrency controller, retried, and
//!   finally stored as text on a degraded [`crate::output::ExtractionResult`].
//!   It never aborts a job.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal and pipeline-level errors returned by the library.
#[derive(Debug, Error)]
pub enum DocExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// Base64 payload could not be decoded.
    #[error("Input for '{file_name}' is not valid base64: {detail}")]
    InvalidBase64 { file_name: String, detail: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF nor a decodable image.
    #[error("Unsupported media type '{mime_type}' for '{file_name}'")]
    UnsupportedMediaType { file_name: String, mime_type: String },

    /// The image header could not be read.
    #[error("Could not decode image '{file_name}': {detail}")]
    ImageDecodeFailed { file_name: String, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{file_name}' is corrupt: {detail}")]
    CorruptPdf { file_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{file_name}' is encrypted and requires a password")]
    PasswordRequired { file_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{file_name}'")]
    WrongPassword { file_name: String },

    /// The PDF opened but contains no pages.
    #[error("PDF '{file_name}' has no pages")]
    EmptyDocument { file_name: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A full-text page could not be transcribed after all retries.
    #[error("Full-text extraction failed on page {page} after {attempts} attempts: {detail}")]
    FullTextFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    // ── Layout errors ─────────────────────────────────────────────────────
    /// No endpoint configured for the requested layout method.
    #[error("No endpoint configured for layout method '{method}'")]
    LayoutNotConfigured { method: String },

    /// The OCR back-end answered with an error or could not be reached.
    #[error("Layout request ({method}) failed{}: {detail}", http_suffix(.status))]
    LayoutRequestFailed {
        method: String,
        status: Option<u16>,
        detail: String,
    },

    /// The OCR back-end did not answer within the timeout.
    #[error("Layout request ({method}) timed out after {secs}s")]
    LayoutTimeout { method: String, secs: u64 },

    /// The OCR back-end answered with a payload we cannot interpret.
    #[error("Layout response ({method}) could not be parsed: {detail}")]
    LayoutResponseInvalid { method: String, detail: String },

    // ── Aggregate ─────────────────────────────────────────────────────────
    /// Both the block pipeline and the full-text pipeline failed.
    ///
    /// Returned by [`crate::output::ExtractionOutput::into_result`].
    #[error("Both pipelines failed. Layout: {layout}. Full text: {full_text}")]
    AllPipelinesFailed { layout: String, full_text: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed vision-model call.
///
/// Upstream providers report throttling in many shapes (status codes,
/// vendor-specific messages), so classification in [`CallError::is_rate_limit`]
/// is a best-effort match on both. A misclassified error only changes how the
/// concurrency controller reacts; the call is retried either way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallError {
    /// HTTP status, when the provider exposed one.
    pub status: Option<u16>,
    /// Human-readable failure description.
    pub message: String,
}

static STATUS_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:status|http|code)[^0-9]{0,12}([45]\d\d)\b|\b(429)\b").expect("valid regex")
});

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {s}")).unwrap_or_default()
}

const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota exceeded",
    "resource exhausted",
    "resource_exhausted",
];

impl CallError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build from a provider error message, sniffing an HTTP status if one
    /// appears in the text (e.g. `"API error (status 429): ..."`).
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let status = STATUS_CODE.captures(&message).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .and_then(|m| m.as_str().parse().ok())
        });
        Self { status, message }
    }

    /// The call did not finish within `secs`.
    pub fn timeout(secs: u64) -> Self {
        Self::new(None, format!("vision model call timed out after {secs}s"))
    }

    /// Whether this failure looks like provider throttling.
    pub fn is_rate_limit(&self) -> bool {
        if self.status == Some(429) {
            return true;
        }
        let lower = self.message.to_ascii_lowercase();
        RATE_LIMIT_SIGNATURES.iter().any(|sig| lower.contains(sig))
    }
}
