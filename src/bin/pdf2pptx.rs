//! CLI binary for edgequake-pdf2pptx.
//!
//! A thin controlling surface over the batch worker: maps flags to
//! `ConversionConfig`, renders worker events, and turns Ctrl-C into a
//! cooperative cancel.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2pptx::settings::Settings;
use edgequake_pdf2pptx::{spawn_batch, BatchStatus, ConversionConfig, ReconstructionMode, WorkerEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Exit codes ───────────────────────────────────────────────────────────────

const EXIT_SETUP: u8 = 1;
const EXIT_INVALID_CREDENTIAL: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

// ── Event rendering ──────────────────────────────────────────────────────────

/// Where worker log lines go: above the progress bar, or plain stdout.
struct Reporter {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl Reporter {
    fn new(show_progress: bool, quiet: bool) -> Self {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
            bar.set_style(style);
            bar.set_prefix("Starting");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Self { bar, quiet }
    }

    fn line(&self, text: String) {
        match &self.bar {
            Some(bar) => bar.println(text),
            None if !self.quiet => println!("{text}"),
            None => {}
        }
    }

    fn handle(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Log(text) => self.line(dim(&text)),
            WorkerEvent::FileStarted { index, total, path } => {
                if let Some(bar) = &self.bar {
                    bar.set_prefix(format!("File {index}/{total}"));
                    bar.set_message(
                        path.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    );
                }
            }
            WorkerEvent::PageStarted { page, total } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(format!("page {page}/{total}"));
                }
            }
            WorkerEvent::Progress(percent) => {
                if let Some(bar) = &self.bar {
                    bar.set_position(percent.round() as u64);
                }
            }
            WorkerEvent::FileSaved { path } => {
                self.line(format!("  {} {}", green("✓"), bold(&path.display().to_string())));
            }
            WorkerEvent::FileFailed { path, error } => {
                // Truncate very long error messages to keep output tidy.
                let msg = match error.char_indices().nth(100) {
                    Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
                    None => error,
                };
                self.line(format!("  {} {}  {}", red("✗"), path.display(), red(&msg)));
            }
            WorkerEvent::Finished(_) => {
                if let Some(bar) = &self.bar {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rebuild a slide PDF as an editable deck (written next to the input)
  pdf2pptx lecture.pdf

  # Several files into one directory, text-focus mode
  pdf2pptx --mode text-focus -d out/ a.pdf b.png c.jpg

  # Bigger text
  pdf2pptx --font-scale 1.3 handout.pdf

  # Remember the API key for later runs
  pdf2pptx --api-key AIza... --save-api-key

  # Use another vision provider through edgequake-llm
  pdf2pptx --provider openai --model gpt-4.1 scan.png

MODES:
  standard     Figures are cropped into pictures; text boxes on a blank slide.
  text-focus   The page render becomes the background; the original text is
               masked with its surrounding colour and redrawn as text boxes.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Gemini API key
  GEMINI_API_KEY          Gemini API key (fallback)
  EDGEQUAKE_LLM_PROVIDER  Provider used when no Gemini key is available
  EDGEQUAKE_MODEL         Model for that provider
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Override the log filter

EXIT STATUS:
  0    all files processed (individual failures are reported, not fatal)
  1    setup failure
  2    the inference service rejected the API key
  130  cancelled with Ctrl-C
"#;

/// Rebuild PDF pages and images as editable PowerPoint slides.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2pptx",
    version,
    about = "Rebuild PDF pages and images as editable PowerPoint slides",
    long_about = "Rasterise each page of a PDF (or take a PNG/JPEG/BMP image as one page), \
detect its text blocks and figures with a vision model, and write a .pptx deck with one \
editable slide per page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image files, processed in order.
    #[arg(required_unless_present = "save_api_key")]
    files: Vec<PathBuf>,

    /// Reconstruction mode.
    #[arg(long, env = "PDF2PPTX_MODE", value_enum, default_value = "standard")]
    mode: ModeArg,

    /// Multiplier applied to every detected font size.
    #[arg(long, env = "PDF2PPTX_FONT_SCALE", default_value_t = 1.1)]
    font_scale: f64,

    /// Gemini API key. Falls back to GOOGLE_API_KEY, GEMINI_API_KEY, then the saved key.
    #[arg(long, env = "PDF2PPTX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Persist --api-key to the settings file.
    #[arg(long, requires = "api_key")]
    save_api_key: bool,

    /// Write decks here instead of next to each input.
    #[arg(short = 'd', long, env = "PDF2PPTX_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Model ID (default: gemini-2.5-flash).
    #[arg(long, env = "PDF2PPTX_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, …) instead of the built-in Gemini client.
    #[arg(long, env = "PDF2PPTX_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PPTX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to a text file containing a custom layout prompt.
    #[arg(long, env = "PDF2PPTX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max output tokens per layout response.
    #[arg(long, env = "PDF2PPTX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF2PPTX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on transient inference failures.
    #[arg(long, env = "PDF2PPTX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call inference timeout in seconds.
    #[arg(long, env = "PDF2PPTX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PPTX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PPTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PPTX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Standard,
    #[value(alias = "text_focus")]
    TextFocus,
}

impl From<ModeArg> for ReconstructionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Standard => ReconstructionMode::Standard,
            ModeArg::TextFocus => ReconstructionMode::TextFocus,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep INFO logs out of the way while the progress bar is drawing.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.files.is_empty();
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

    // ── Save API key ─────────────────────────────────────────────────────
    if cli.save_api_key {
        let settings = Settings {
            api_key: cli.api_key.clone(),
        };
        let path = settings.save_default().context("Failed to save API key")?;
        if !cli.quiet {
            eprintln!("{} API key saved to {}", green("✔"), path.display());
        }
        if cli.files.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    let config = build_config(&cli).await?;
    let total = cli.files.len();

    // ── Run the worker ───────────────────────────────────────────────────
    let mut handle = spawn_batch(cli.files.clone(), config).context("Failed to start conversion")?;
    let reporter = Reporter::new(show_progress, cli.quiet);
    reporter.line(format!(
        "{} {}",
        cyan("◆"),
        bold(&format!("Converting {total} file(s)…"))
    ));

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(event) => reporter.handle(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                handle.cancel.cancel();
                reporter.line(format!("{} cancelling after the current page…", cyan("⚠")));
            }
        }
    }

    let status = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("Worker thread join failed")?;

    Ok(report_status(&status, cli.quiet))
}

/// Print the final summary and map the terminal status to an exit code.
fn report_status(status: &BatchStatus, quiet: bool) -> ExitCode {
    match status {
        BatchStatus::Completed { saved, failed } => {
            if !quiet {
                if *failed == 0 {
                    eprintln!("{} {} deck(s) written", green("✔"), bold(&saved.to_string()));
                } else {
                    eprintln!(
                        "{} {} deck(s) written  ({} failed)",
                        cyan("⚠"),
                        bold(&saved.to_string()),
                        red(&failed.to_string()),
                    );
                }
            }
            ExitCode::SUCCESS
        }
        BatchStatus::Cancelled => {
            if !quiet {
                eprintln!("{} Conversion cancelled", cyan("⚠"));
            }
            ExitCode::from(EXIT_CANCELLED)
        }
        BatchStatus::InvalidCredential(detail) => {
            eprintln!("{} Invalid API key: {}", red("✘"), detail);
            ExitCode::from(EXIT_INVALID_CREDENTIAL)
        }
        BatchStatus::Failed(detail) => {
            eprintln!("{} {}", red("✘"), detail);
            ExitCode::from(EXIT_SETUP)
        }
    }
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .mode(cli.mode.into())
        .font_scale(cli.font_scale)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
