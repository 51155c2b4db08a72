//! Configuration types for a table-extraction run.
//!
//! Everything a run needs is carried in one immutable [`RunConfig`], built
//! via its [`RunConfigBuilder`] and handed to [`crate::run()`] by reference.
//! The add-on framework supplies the user-facing knobs as a JSON object,
//! deserialised into [`RunParams`] and applied with
//! [`RunConfigBuilder::params`].

use crate::error::TableExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credits charged per analysed page.
pub const DEFAULT_CREDITS_PER_PAGE: u64 = 7;

/// Configuration for one table-extraction run.
///
/// # Example
/// ```rust
/// use dc_tables::{OutputFormat, PageRange, RunConfig};
///
/// let config = RunConfig::builder()
///     .output_format(OutputFormat::Csv)
///     .page_range(PageRange::new(1, 3))
///     .build()
///     .unwrap();
/// assert_eq!(config.archive_name, "tables.zip");
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Export format for each document's tables. Default: [`OutputFormat::Json`].
    pub output_format: OutputFormat,

    /// Pages to analyse in every document, clamped per document. Default: 1–1.
    pub page_range: PageRange,

    /// Credits charged per analysed page. Default: 7.
    pub credits_per_page: u64,

    /// How CSV rows are filled from cells. Default: [`CellPlacement::Arrival`].
    pub cell_placement: CellPlacement,

    /// Page image download timeout in seconds. Default: 20.
    pub download_timeout_secs: u64,

    /// Per-request timeout for the analysis service in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Delay between polls of a running analysis, in milliseconds. Default: 1000.
    ///
    /// Used only when the service does not send a `Retry-After` header.
    pub poll_interval_ms: u64,

    /// Analysis model identifier. Default: `prebuilt-layout`.
    pub model_id: String,

    /// Analysis REST API version. Default: `2023-07-31`.
    pub api_version: String,

    /// File name of the uploaded archive. Default: `tables.zip`.
    pub archive_name: String,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            page_range: PageRange::default(),
            credits_per_page: DEFAULT_CREDITS_PER_PAGE,
            cell_placement: CellPlacement::default(),
            download_timeout_secs: 20,
            api_timeout_secs: 60,
            poll_interval_ms: 1000,
            model_id: "prebuilt-layout".to_string(),
            api_version: "2023-07-31".to_string(),
            archive_name: "tables.zip".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("output_format", &self.output_format)
            .field("page_range", &self.page_range)
            .field("credits_per_page", &self.credits_per_page)
            .field("cell_placement", &self.cell_placement)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("archive_name", &self.archive_name)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Apply the add-on's user-supplied parameters.
    pub fn params(mut self, params: &RunParams) -> Self {
        self.config.output_format = params.output_format;
        self.config.page_range = PageRange::new(params.start_page, params.end_page);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn page_range(mut self, range: PageRange) -> Self {
        self.config.page_range = range;
        self
    }

    pub fn credits_per_page(mut self, credits: u64) -> Self {
        self.config.credits_per_page = credits;
        self
    }

    pub fn cell_placement(mut self, placement: CellPlacement) -> Self {
        self.config.cell_placement = placement;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.config.archive_name = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The page range is deliberately *not* checked here: a bad range is a
    /// user error reported through the run gate, not a programming error.
    pub fn build(self) -> Result<RunConfig, TableExtractError> {
        let c = &self.config;
        if c.download_timeout_secs == 0 {
            return Err(TableExtractError::InvalidConfig(
                "Download timeout must be ≥ 1s".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(TableExtractError::InvalidConfig(
                "API timeout must be ≥ 1s".into(),
            ));
        }
        if c.model_id.trim().is_empty() {
            return Err(TableExtractError::InvalidConfig(
                "Model id must not be empty".into(),
            ));
        }
        if c.archive_name.trim().is_empty() {
            return Err(TableExtractError::InvalidConfig(
                "Archive name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Add-on parameters ────────────────────────────────────────────────────

/// User-facing parameters as delivered by the add-on framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_start_page")]
    pub start_page: i64,
    #[serde(default = "default_end_page")]
    pub end_page: i64,
}

fn default_start_page() -> i64 {
    1
}

fn default_end_page() -> i64 {
    1
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            start_page: default_start_page(),
            end_page: default_end_page(),
        }
    }
}

/// API key and endpoint for the analysis service.
#[derive(Clone)]
pub struct AnalysisCredentials {
    pub key: String,
    pub endpoint: String,
}

impl AnalysisCredentials {
    /// Environment variable holding the API key.
    pub const KEY_VAR: &'static str = "KEY";
    /// Environment variable holding the service endpoint URL.
    pub const ENDPOINT_VAR: &'static str = "TOKEN";

    pub fn new(key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Read both secrets from the environment.
    pub fn from_env() -> Result<Self, TableExtractError> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    TableExtractError::InvalidConfig(format!(
                        "environment variable {var} is not set"
                    ))
                })
        };
        Ok(Self::new(read(Self::KEY_VAR)?, read(Self::ENDPOINT_VAR)?))
    }
}

impl fmt::Debug for AnalysisCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisCredentials")
            .field("key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Export format for each document's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented JSON list of table records. (default)
    #[default]
    Json,
    /// Flattened CSV grid, one block per table.
    Csv,
}

impl OutputFormat {
    /// File extension used for this format's archive entries.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    /// Archive entry name for one document, e.g. `tables-123.json`.
    pub fn file_name(self, document_id: &str) -> String {
        format!("tables-{}.{}", document_id, self.extension())
    }
}

/// How cells are laid out in a CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellPlacement {
    /// Append each cell to its row in the order the service returned it;
    /// `column_index` is ignored. (default)
    #[default]
    Arrival,
    /// Put each cell at its `column_index`, padding gaps with empty fields.
    Column,
}

/// Inclusive 1-based page interval, clamped per document.
///
/// Bounds are signed so that out-of-range user input (e.g. `start_page: 0`
/// or `-2`) survives deserialisation and reaches the run gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start_page: i64,
    pub end_page: i64,
}

impl Default for PageRange {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl PageRange {
    pub fn new(start_page: i64, end_page: i64) -> Self {
        Self {
            start_page,
            end_page,
        }
    }

    /// Last page analysed in a document of `page_count` pages.
    pub fn last_page_for(&self, page_count: u32) -> i64 {
        self.end_page.min(i64::from(page_count))
    }

    /// Number of pages analysed in a document of `page_count` pages.
    ///
    /// Never negative: a document shorter than `start_page` contributes 0.
    pub fn page_count_for(&self, page_count: u32) -> u64 {
        let n = self.last_page_for(page_count) - self.start_page + 1;
        n.max(0) as u64
    }

    /// The 1-based page numbers analysed in a document of `page_count` pages.
    pub fn pages_for(&self, page_count: u32) -> impl Iterator<Item = u32> {
        let first = self.start_page.max(1);
        (first..=self.last_page_for(page_count)).filter_map(|p| u32::try_from(p).ok())
    }
}
