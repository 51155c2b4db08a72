//! Error types for the dc-tables library.
//!
//! Two kinds of failure exist and they travel on different paths:
//!
//! * [`TableExtractError`] (**fatal**): something past the run gate broke
//!   (page image download, image decoding, the analysis service, local I/O,
//!   the upload). Returned as `Err(TableExtractError)` from [`crate::run()`]
//!   after any credit hold has been released.
//!
//! * [`HaltReason`] (**graceful**): the run was stopped before any paid work
//!   because of something the user can fix (no documents, no organization,
//!   not enough credits, a bad page range). Carried inside
//!   [`crate::output::RunOutcome::Halted`], never as an `Err`.
//!
//! [`BillingError`] is what a [`crate::platform::CreditLedger`] reports when a
//! reservation fails; the gate folds it into [`HaltReason::InsufficientCredits`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the dc-tables library.
#[derive(Debug, Error)]
pub enum TableExtractError {
    // ── Page image errors ────────────────────────────────────────────────
    /// Page image URL was reachable but the download failed.
    #[error("Failed to download page image '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Page image download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The downloaded bytes could not be decoded or re-encoded as PNG.
    #[error("Page {page} of document {document}: image conversion failed: {detail}")]
    ImageConversion {
        document: String,
        page: u32,
        detail: String,
    },

    // ── Analysis service errors ──────────────────────────────────────────
    /// Analysis service rejected the credentials (401/403).
    #[error("Authentication error from analysis service: {detail}")]
    AuthError { detail: String },

    /// Analysis service returned HTTP 429.
    #[error("Rate limit exceeded by analysis service")]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    /// Analysis service returned any other error status or an unusable body.
    #[error("Analysis API error: {message}")]
    AnalysisApi { message: String },

    /// The analysis operation finished with a non-success status.
    #[error("Analysis of page {page} failed with status '{status}'")]
    AnalysisFailed { page: u32, status: String },

    // ── Platform errors ──────────────────────────────────────────────────
    /// The document-hosting platform returned an error.
    #[error("Document platform error: {0}")]
    Platform(String),

    /// A document id that cannot name a workspace file or archive entry.
    #[error("Invalid document id '{id}': {reason}")]
    InvalidDocumentId { id: String, reason: String },

    /// Uploading the finished archive failed.
    #[error("Failed to upload '{name}': {reason}")]
    UploadFailed { name: String, reason: String },

    // ── Output errors ────────────────────────────────────────────────────
    /// Could not write a local workspace or output file.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a CSV export failed.
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the zip archive failed.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialising the JSON export failed.
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed or a credential is missing.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a credit reservation could not be made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    /// The organization does not hold enough credits.
    #[error("insufficient credits: {0}")]
    InsufficientCredits(String),

    /// The billing API failed for any other reason.
    #[error("billing API error: {0}")]
    Api(String),
}

/// A graceful stop before any paid work, with the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum HaltReason {
    #[error(
        "It looks like no documents were selected. Search for some or select them and run again."
    )]
    NoDocuments,

    #[error("No organization to charge.")]
    NoOrganization,

    #[error("You do not have sufficient AI credits to run this Add-On on this document set")]
    InsufficientCredits,

    #[error("The end page you provided is smaller than the start page, try again")]
    EndBeforeStart,

    #[error("Your start page is less than 1, please try again")]
    StartBelowOne,
}
