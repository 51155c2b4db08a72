//! # dc-tables
//!
//! Extract tables from DocumentCloud documents with Azure Document
//! Intelligence and bundle them as JSON or CSV in one zip archive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! selected documents
//!  │
//!  ├─ 1. Gate       documents? organization? valid page range? reserve credits
//!  ├─ 2. Normalize  download each page image (GIF) → PNG
//!  ├─ 3. Analyze    prebuilt-layout model, submit + poll
//!  ├─ 4. Shape      service tables → TableRecord { page_number, cells }
//!  ├─ 5. Export     tables-<id>.json  or  tables-<id>.csv
//!  └─ 6. Bundle     tables.zip → upload, capture credits
//! ```
//!
//! A run costs 7 credits per analysed page. Pages are clamped per document:
//! a 2-page document with `end_page: 10` is analysed (and billed) for 2 pages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dc_tables::platform::documentcloud::{DocumentCloudClient, DEFAULT_API_BASE};
//! use dc_tables::{run, AnalysisCredentials, AzureLayoutAnalyzer, Capabilities,
//!     HttpImageFetcher, RunConfig, RunOutcome, RunParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let params: RunParams = serde_json::from_str(r#"{"output_format": "csv", "end_page": 3}"#)?;
//!     let config = RunConfig::builder().params(&params).build()?;
//!
//!     let platform = DocumentCloudClient::new(DEFAULT_API_BASE, 30)?
//!         .with_documents(["20059100".to_string()])
//!         .with_organization("1");
//!     let fetcher = HttpImageFetcher::new(config.download_timeout_secs)?;
//!     let analyzer = AzureLayoutAnalyzer::new(&AnalysisCredentials::from_env()?, &config)?;
//!
//!     let caps = Capabilities {
//!         documents: &platform,
//!         ledger: &platform,
//!         sink: &platform,
//!         fetcher: &fetcher,
//!         analyzer: &analyzer,
//!     };
//!     match run(&config, &caps).await? {
//!         RunOutcome::Completed(summary) => println!("{} tables", summary.total_tables()),
//!         RunOutcome::Halted(reason) => println!("{reason}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `dc-tables` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod run;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AnalysisCredentials, CellPlacement, OutputFormat, PageRange, RunConfig, RunConfigBuilder,
    RunParams,
};
pub use error::{BillingError, HaltReason, TableExtractError};
pub use output::{CellRecord, DocumentSummary, RunOutcome, RunSummary, TableRecord};
pub use pipeline::analyze::{AnalysisResult, AzureLayoutAnalyzer, TableAnalyzer};
pub use pipeline::normalize::{HttpImageFetcher, ImageFetcher};
pub use platform::{ArtifactSink, CreditHold, CreditLedger, Document, DocumentSource};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{run, Capabilities};
