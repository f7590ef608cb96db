//! CLI binary for edgequake-docextract.
//!
//! Maps flags onto `ExtractionConfig`, runs one job and prints the result as
//! JSON (or just the full-text Markdown).

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_docextract::{
    extract_path, ConcurrencyLimits, ExtractionConfig, ExtractionOutput,
    ExtractionProgressCallback, LayoutMethod, PipelineStatus, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── Progress bar ─────────────────────────────────────────────────────────────

/// Block-level progress bar. Blocks finish out of order, so the bar only
/// counts; failures and window changes are logged above it.
struct CliProgress {
    bar: ProgressBar,
    degraded: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.set_message("rendering pages and detecting layout…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            degraded: AtomicUsize::new(0),
        })
    }

    /// Stop the spinner. The scheduler never runs when layout detection
    /// fails, so the bar may still be ticking when the job returns.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

impl ExtractionProgressCallback for CliProgress {
    fn on_extraction_start(&self, total_blocks: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>4}/{len} blocks  \
                 {msg}  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_length(total_blocks as u64);
        self.bar.set_prefix("Extracting");
        self.bar.set_message(String::new());
    }

    fn on_block_complete(&self, _block_index: usize, _total: usize, _text_len: usize) {
        self.bar.inc(1);
    }

    fn on_block_error(&self, block_index: usize, _total: usize, error: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        let msg: String = error.chars().take(80).collect();
        self.bar
            .println(format!("  {} block {:>4}  {}", red("✗"), block_index, red(&msg)));
        self.bar.inc(1);
    }

    fn on_concurrency_change(&self, previous: usize, current: usize) {
        let arrow = if current < previous { yellow("▼") } else { green("▲") };
        self.bar.set_message(format!("{arrow} window {current}"));
    }

    fn on_extraction_complete(&self, total_blocks: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let degraded = self.degraded.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} blocks corrected{}",
            if degraded == 0 { green("✔") } else { yellow("⚠") },
            succeeded,
            total_blocks,
            if degraded == 0 {
                String::new()
            } else {
                format!("  ({} kept OCR text)", degraded)
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fast layout detector, JSON to stdout
  docextract --fast-endpoint http://localhost:8000/layout scan.pdf

  # High-accuracy layout model, write JSON to a file
  docextract --layout high-accuracy --accurate-endpoint http://ocr:9000/v1/layout \
    report.pdf -o report.json

  # Only the full-document Markdown
  docextract --markdown-only https://example.com/paper.pdf -o paper.md

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY   Vision model credentials
  EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL              Provider/model override
  DOCEXTRACT_FAST_ENDPOINT / DOCEXTRACT_ACCURATE_ENDPOINT
  DOCEXTRACT_LAYOUT_API_KEY                             Bearer token for the OCR back-end
  PDFIUM_LIB_PATH                                       Path to libpdfium
"#;

/// Extract layout blocks and Markdown from PDFs and scanned images.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract layout blocks and Markdown from PDFs and images with OCR + Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "DOCEXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Layout back-end.
    #[arg(long, env = "DOCEXTRACT_LAYOUT", value_enum, default_value = "fast-generic")]
    layout: LayoutArg,

    /// Endpoint of the fast generic layout detector.
    #[arg(long, env = "DOCEXTRACT_FAST_ENDPOINT")]
    fast_endpoint: Option<String>,

    /// Endpoint of the high-accuracy layout model.
    #[arg(long, env = "DOCEXTRACT_ACCURATE_ENDPOINT")]
    accurate_endpoint: Option<String>,

    /// Bearer token for the layout back-end.
    #[arg(long, env = "DOCEXTRACT_LAYOUT_API_KEY", hide_env_values = true)]
    layout_api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision model provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF render scale (0.5–4.0).
    #[arg(long, env = "DOCEXTRACT_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Starting number of concurrent block extractions.
    #[arg(short, long, env = "DOCEXTRACT_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Lower bound of the adaptive window.
    #[arg(long, env = "DOCEXTRACT_MIN_CONCURRENCY", default_value_t = 2)]
    min_concurrency: usize,

    /// Upper bound of the adaptive window.
    #[arg(long, env = "DOCEXTRACT_MAX_CONCURRENCY", default_value_t = 10)]
    max_concurrency: usize,

    /// Retries per model call.
    #[arg(long, env = "DOCEXTRACT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base retry back-off in milliseconds.
    #[arg(long, env = "DOCEXTRACT_BACKOFF_MS", default_value_t = 1000)]
    backoff_ms: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCEXTRACT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Layout back-end timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_OCR_TIMEOUT", default_value_t = 240)]
    ocr_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print only the full-document Markdown instead of JSON.
    #[arg(long)]
    markdown_only: bool,

    /// Exit with an error when both pipelines fail.
    #[arg(long)]
    strict: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCEXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    FastGeneric,
    HighAccuracy,
}

impl From<LayoutArg> for LayoutMethod {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::FastGeneric => LayoutMethod::FastGeneric,
            LayoutArg::HighAccuracy => LayoutMethod::HighAccuracy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let bar = show_progress.then(CliProgress::new);
    let progress = bar.clone().map(|b| b as ProgressCallback);
    let config = build_config(&cli, progress)?;

    let output = extract_path(&cli.input, &config).await;
    if let Some(ref bar) = bar {
        bar.finish();
    }
    let output = output.context("Extraction failed")?;

    if !cli.quiet {
        print_summary(&output);
    }

    let rendered = if cli.markdown_only {
        output.full_text.clone().unwrap_or_default()
    } else {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    };
    match cli.output {
        Some(ref path) => write_atomic(path, &rendered).await?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if cli.strict && !output.success {
        bail!(
            "{}",
            output.error.unwrap_or_else(|| "both pipelines failed".into())
        );
    }
    Ok(())
}

fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .layout_method(cli.layout.into())
        .render_scale(cli.scale)
        .concurrency(ConcurrencyLimits {
            initial: cli.concurrency,
            min: cli.min_concurrency,
            max: cli.max_concurrency,
            ..Default::default()
        })
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .ocr_timeout_secs(cli.ocr_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref url) = cli.fast_endpoint {
        builder = builder.fast_endpoint(url);
    }
    if let Some(ref url) = cli.accurate_endpoint {
        builder = builder.accurate_endpoint(url);
    }
    if let Some(ref key) = cli.layout_api_key {
        builder = builder.layout_api_key(key);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &ExtractionOutput) {
    let status = |s: PipelineStatus| match s {
        PipelineStatus::Completed => green("completed"),
        PipelineStatus::Error => red("error"),
    };
    let s = &output.stats;
    eprintln!(
        "   layout {}  full text {}  {} pages  {} blocks  {}",
        status(output.layout_status),
        status(output.full_text_status),
        s.total_pages,
        s.total_blocks,
        dim(&format!("{}ms total", s.total_duration_ms)),
    );
    if let Some(ref e) = output.layout_error {
        eprintln!("   {} layout: {}", red("✗"), e);
    }
    if let Some(ref e) = output.full_text_error {
        eprintln!("   {} full text: {}", red("✗"), e);
    }
}

/// Write to a temp file, then rename, so readers never see a partial file.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
