//! CLI binary for edgequake-exam.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the extracted exam.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_exam::config::DEFAULT_MODEL;
use edgequake_exam::extract::write_atomic;
use edgequake_exam::{
    extract, extract_to_file, inspect, ExamError, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback,
    OutputFormat, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the pipeline stages.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_pages_rasterized(&self, page_count: usize) {
        self.bar
            .println(format!("  {} {} page(s) rendered", green("✓"), page_count));
    }

    fn on_request_sent(&self, part_count: usize, payload_bytes: usize) {
        self.bar.println(format!(
            "  {} request sent  {}",
            green("✓"),
            dim(&format!(
                "{part_count} parts, {:.1} MB",
                payload_bytes as f64 / 1_048_576.0
            ))
        ));
    }

    fn on_preview_failed(&self, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} preview skipped  {}", cyan("⚠"), dim(&msg)));
    }

    fn on_complete(&self, section_count: usize, question_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} questions in {} sections",
            green("✔"),
            bold(&question_count.to_string()),
            section_count
        );
    }

    fn on_failed(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a scanned exam to stdout
  exam2json final-2023.pdf

  # Write JSON to a file
  exam2json final-2023.pdf -o final-2023.json

  # Human-readable Markdown instead of JSON
  exam2json --format markdown photo.jpg -o photo.md

  # Save the page-1 preview next to the output
  exam2json paper.pdf -o paper.json --preview paper-preview.jpg

  # Use a stronger model
  exam2json --model gemini-2.5-pro paper.pdf

  # Check type and page count (no API key needed)
  exam2json --inspect-only paper.pdf

SUPPORTED INPUT:
  PNG, JPEG, WEBP images and PDF documents. The type is detected from the
  file contents, not the extension.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY      Google Gemini API key
  API_KEY             Fallback API key
  EXAM2JSON_MODEL     Override model ID
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Log filter, e.g. edgequake_exam=debug

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Extract:         exam2json paper.pdf -o paper.json

  PDF input needs the pdfium shared library. Put it next to the exam2json
  binary or point PDFIUM_LIB_PATH at it. Image input works without it.
"#;

/// Extract structured exam questions from images and PDFs using Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "exam2json",
    version,
    about = "Extract structured exam questions from images and PDFs using Gemini",
    long_about = "Send every page of an exam paper (PNG, JPEG, WEBP or PDF) to a Gemini vision \
model in one request and print the questions, options, marks and answers as JSON or Markdown.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Exam image or PDF.
    input: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "EXAM2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "EXAM2JSON_FORMAT", value_enum, default_value = "json")]
    format: FormatArg,

    /// Write the preview image (page 1, or the uploaded image) to this path.
    #[arg(long, env = "EXAM2JSON_PREVIEW")]
    preview: Option<PathBuf>,

    /// Gemini model ID.
    #[arg(long, env = "EXAM2JSON_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Gemini REST base URL.
    #[arg(long, env = "EXAM2JSON_BASE_URL")]
    base_url: Option<String>,

    /// Env vars to read the API key from, in order (comma-separated).
    #[arg(long, env = "EXAM2JSON_API_KEY_ENV", value_delimiter = ',')]
    api_key_env: Vec<String>,

    /// PDF render scale (1.0 = 72 DPI).
    #[arg(long, env = "EXAM2JSON_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// JPEG quality for rendered pages (1–100).
    #[arg(long, env = "EXAM2JSON_JPEG_QUALITY", default_value_t = 92,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Request timeout in seconds.
    #[arg(long, env = "EXAM2JSON_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Sampling temperature (0.0–2.0). Service default if unset.
    #[arg(long, env = "EXAM2JSON_TEMPERATURE")]
    temperature: Option<f32>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "EXAM2JSON_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Skip the semantic checks (option ids, answers, question numbers).
    #[arg(long, env = "EXAM2JSON_NO_VALIDATE")]
    no_validate: bool,

    /// Print file type and page count only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "EXAM2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAM2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXAM2JSON_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.map_err(user_facing(cli.verbose))?;
        println!("File:         {}", cli.input.display());
        println!("Type:         {}", info.mime_type);
        println!("Size:         {} bytes", info.size_bytes);
        if let Some(pages) = info.page_count {
            println!("Pages:        {}", pages);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let format = OutputFormat::from(cli.format);
    let target = cli
        .output
        .as_deref()
        .map(|p| format.with_default_extension(p));

    let output = if let Some(ref output_path) = target {
        extract_to_file(&cli.input, output_path, format, &config)
            .await
            .map_err(user_facing(cli.verbose))?
    } else {
        let output = extract(&cli.input, &config)
            .await
            .map_err(user_facing(cli.verbose))?;
        let rendered = format.render(&output.exam).map_err(user_facing(cli.verbose))?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        output
    };

    if let Some(ref preview_path) = cli.preview {
        match output.preview {
            Some(ref preview) => write_atomic(preview_path, &preview.data)
                .await
                .map_err(user_facing(cli.verbose))?,
            None if !cli.quiet => eprintln!("{} no preview available", cyan("⚠")),
            None => {}
        }
    }

    if !cli.quiet {
        print_summary(target.as_deref(), &output);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model(cli.model.clone())
        .render_scale(cli.scale)
        .jpeg_quality(cli.jpeg_quality)
        .request_timeout_secs(cli.timeout)
        .validate_schema(!cli.no_validate);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if !cli.api_key_env.is_empty() {
        builder = builder.api_key_env(cli.api_key_env.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    // The preview is only rendered when someone will look at it.
    builder = builder.generate_preview(cli.preview.is_some());

    builder.build().map_err(user_facing(cli.verbose))
}

/// The short user message; with `verbose` the full error chain follows it.
fn user_facing(verbose: bool) -> impl Fn(ExamError) -> anyhow::Error {
    move |e| {
        let msg = e.user_message();
        if verbose {
            anyhow::Error::new(e).context(msg)
        } else {
            anyhow::anyhow!(msg)
        }
    }
}

fn print_summary(target: Option<&Path>, output: &ExtractionOutput) {
    let stats = &output.stats;
    let meta = &output.exam.exam_metadata;
    let target = target
        .map(|p| bold(&p.display().to_string()))
        .unwrap_or_else(|| "stdout".to_string());
    eprintln!(
        "{}  {} {} ({})  {} page(s)  {}ms  →  {}",
        green("✔"),
        meta.course_code,
        meta.year,
        meta.semester,
        stats.page_count,
        stats.total_duration_ms,
        target,
    );
    if let (Some(i), Some(o)) = (stats.prompt_tokens, stats.output_tokens) {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&i.to_string()),
            dim(&o.to_string())
        );
    }
    if output.exam.sections.is_empty() {
        eprintln!("   {}", red("no sections were found in the document"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_error() -> ExamError {
        ExamError::SchemaViolation {
            detail: "correct_answer 'E' does not match any option_id".into(),
        }
    }

    #[test]
    fn errors_show_only_the_user_message_by_default() {
        let err = user_facing(false)(schema_error());
        let shown = format!("{err:?}");
        assert_eq!(shown, schema_error().user_message());
        assert!(!shown.contains("Caused by"));
        assert!(!shown.contains("'E'"));
    }

    #[test]
    fn verbose_errors_include_the_chain() {
        let shown = format!("{:?}", user_facing(true)(schema_error()));
        assert!(shown.starts_with(&schema_error().user_message()));
        assert!(shown.contains("Caused by"));
        assert!(shown.contains("'E'"));
    }

    #[test]
    fn output_path_gets_format_extension() {
        let cli = Cli::parse_from(["exam2json", "exam.pdf", "-o", "out/result", "--format", "markdown"]);
        let format = OutputFormat::from(cli.format);
        let target = cli.output.as_deref().map(|p| format.with_default_extension(p));
        assert_eq!(target, Some(PathBuf::from("out/result.md")));
    }
}
