//! CLI binary for dc-tables.
//!
//! A thin shim over the library crate: maps flags (and the add-on's JSON
//! parameters) to `RunConfig`, wires the DocumentCloud and Azure adapters
//! into `Capabilities`, and reports the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use dc_tables::platform::documentcloud::{DocumentCloudClient, DEFAULT_API_BASE};
use dc_tables::{
    run, AnalysisCredentials, AzureLayoutAnalyzer, Capabilities, CellPlacement, HttpImageFetcher,
    ProgressCallback, RunConfig, RunOutcome, RunParams, RunProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.green/238}] {pos}/{len} pages  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Arc::new(Self { bar })
    }

    /// Remove the bar when the run ends without `on_run_complete`.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_page_start(&self, document_id: &str, page: u32) {
        self.bar.set_message(format!("document {document_id}, page {page}"));
    }

    fn on_page_complete(&self, _document_id: &str, _page: u32, _tables: usize) {
        self.bar.inc(1);
    }

    fn on_document_complete(&self, document_id: &str, tables: usize) {
        self.bar
            .println(format!("{} document {}: {} tables", green("✔"), document_id, tables));
    }

    fn on_run_complete(&self, _pages: usize, _tables: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract tables from pages 1-3 of two documents as CSV
  dc-tables -d 20059100,20059101 --org 1 \
      --params '{"output_format": "csv", "start_page": 1, "end_page": 3}'

  # Run inside the add-on framework (run id set → archive is uploaded)
  dc-tables -d 20059100 --org 1 --run-id 8c1f… --token $DC_ACCESS_TOKEN

COST:
  7 AI credits per analysed page. Each document is clamped to its own
  length, so end_page beyond the last page is not billed.

ENVIRONMENT VARIABLES:
  KEY               Azure Document Intelligence API key
  TOKEN             Azure Document Intelligence endpoint URL
  DC_ACCESS_TOKEN   DocumentCloud API access token
  DC_ADDON_PARAMS   Add-on parameters as JSON (output_format, start_page, end_page)
"#;

/// Extract tables from DocumentCloud documents with Azure Document Intelligence.
#[derive(Parser, Debug)]
#[command(
    name = "dc-tables",
    version,
    about = "Extract tables from DocumentCloud documents into a zip of JSON or CSV files",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document IDs to process (repeat the flag or separate with commas).
    #[arg(short, long = "document", env = "DC_DOCUMENTS", value_delimiter = ',')]
    documents: Vec<String>,

    /// Organization billed for AI credits.
    #[arg(long, env = "DC_ORG_ID")]
    org: Option<String>,

    /// Add-on run ID. Without one the archive is written to --output-dir.
    #[arg(long, env = "DC_RUN_ID")]
    run_id: Option<String>,

    /// DocumentCloud API access token.
    #[arg(long, env = "DC_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// DocumentCloud API base URL.
    #[arg(long, env = "DC_API_URL", default_value = DEFAULT_API_BASE)]
    api_url: String,

    /// Add-on parameters as a JSON object.
    #[arg(long, env = "DC_ADDON_PARAMS", default_value = "{}")]
    params: String,

    /// Azure Document Intelligence API key.
    #[arg(long, env = "KEY", hide_env_values = true)]
    analysis_key: Option<String>,

    /// Azure Document Intelligence endpoint.
    #[arg(long, env = "TOKEN")]
    analysis_endpoint: Option<String>,

    /// How CSV rows are filled from cells.
    #[arg(long, env = "DC_TABLES_PLACEMENT", value_enum, default_value = "arrival")]
    placement: PlacementArg,

    /// Directory for the archive when there is no add-on run.
    #[arg(short, long, env = "DC_TABLES_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Page image download timeout in seconds.
    #[arg(long, env = "DC_TABLES_DOWNLOAD_TIMEOUT", default_value_t = 20)]
    download_timeout: u64,

    /// Per-request analysis timeout in seconds.
    #[arg(long, env = "DC_TABLES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DC_TABLES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DC_TABLES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DC_TABLES_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PlacementArg {
    Arrival,
    Column,
}

impl From<PlacementArg> for CellPlacement {
    fn from(v: PlacementArg) -> Self {
        match v {
            PlacementArg::Arrival => CellPlacement::Arrival,
            PlacementArg::Column => CellPlacement::Column,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|p| p as ProgressCallback),
    )?;

    // ── Wire capabilities ────────────────────────────────────────────────
    let credentials = analysis_credentials(&cli)?;
    let analyzer = AzureLayoutAnalyzer::new(&credentials, &config)
        .context("Failed to set up the analysis client")?;
    let fetcher = HttpImageFetcher::new(config.download_timeout_secs)
        .context("Failed to set up the image downloader")?;

    let mut platform = DocumentCloudClient::new(&cli.api_url, config.api_timeout_secs)
        .context("Failed to set up the DocumentCloud client")?
        .with_documents(cli.documents.clone())
        .with_local_output(&cli.output_dir);
    if let Some(ref token) = cli.token {
        platform = platform.with_token(token);
    }
    if let Some(ref org) = cli.org {
        platform = platform.with_organization(org);
    }
    if let Some(ref run_id) = cli.run_id {
        platform = platform.with_run_id(run_id);
    }

    let caps = Capabilities {
        documents: &platform,
        ledger: &platform,
        sink: &platform,
        fetcher: &fetcher,
        analyzer: &analyzer,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let result = run(&config, &caps).await;
    if let Some(ref p) = progress {
        p.clear();
    }
    let outcome = result.context("Table extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
        return Ok(());
    }

    match outcome {
        RunOutcome::Completed(summary) => {
            if !cli.quiet {
                eprintln!(
                    "{}  {} documents  {} pages  {} tables  {} credits  {}ms  →  {}",
                    green("✔"),
                    summary.documents.len(),
                    summary.total_pages(),
                    summary.total_tables(),
                    summary.credits_charged,
                    summary.duration_ms,
                    bold(&summary.archive_name),
                );
            }
        }
        // A halt is a clean stop: report it and exit successfully.
        RunOutcome::Halted(reason) => {
            if !cli.quiet {
                eprintln!("{} {}", cyan("⚠"), reason);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `RunConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let params: RunParams = serde_json::from_str(&cli.params)
        .with_context(|| format!("Invalid add-on parameters: {}", cli.params))?;

    let mut builder = RunConfig::builder()
        .params(&params)
        .cell_placement(cli.placement.clone().into())
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Analysis credentials from flags, falling back to `KEY` / `TOKEN`.
fn analysis_credentials(cli: &Cli) -> Result<AnalysisCredentials> {
    match (&cli.analysis_key, &cli.analysis_endpoint) {
        (Some(key), Some(endpoint)) => Ok(AnalysisCredentials::new(key, endpoint)),
        _ => AnalysisCredentials::from_env().context("Missing analysis credentials"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_documents_and_params() {
        let cli = Cli::try_parse_from([
            "dc-tables",
            "-d",
            "1,2",
            "--document",
            "3",
            "--params",
            r#"{"output_format": "csv", "start_page": 2, "end_page": 4}"#,
        ])
        .unwrap();
        assert_eq!(cli.documents, vec!["1", "2", "3"]);

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.output_format, dc_tables::OutputFormat::Csv);
        assert_eq!(config.page_range, dc_tables::PageRange::new(2, 4));
    }

    #[test]
    fn progress_bar_idles_until_run_start_and_clears_on_early_exit() {
        let progress = CliProgressCallback::new();
        assert_eq!(progress.bar.length(), Some(0));
        assert!(!progress.bar.is_finished());

        // A halt never reaches on_run_start or on_run_complete.
        progress.clear();
        assert!(progress.bar.is_finished());
        // Clearing twice is harmless.
        progress.clear();
    }

    #[test]
    fn progress_bar_tracks_pages() {
        let progress = CliProgressCallback::new();
        progress.on_run_start(3);
        progress.on_page_complete("7", 1, 0);
        assert_eq!(progress.bar.length(), Some(3));
        assert_eq!(progress.bar.position(), 1);
        progress.on_run_complete(1, 0);
        assert!(progress.bar.is_finished());
        progress.clear();
    }

    #[test]
    fn bad_params_are_rejected() {
        let cli = Cli::try_parse_from(["dc-tables", "--params", "{not json"]).unwrap();
        assert!(build_config(&cli, None).is_err());
    }
}
