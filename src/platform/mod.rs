//! Capabilities the run needs from the document-hosting platform.
//!
//! The driver never talks to a concrete platform. It receives these traits
//! through [`crate::run::Capabilities`], so a test can swap any of them for
//! an in-memory fake and the binary can plug in [`documentcloud`].
//!
//! | Trait | Used for |
//! |-------|----------|
//! | [`DocumentSource`] | selected documents and page image URLs |
//! | [`CreditLedger`]   | organization lookup and the reserve/capture/release protocol |
//! | [`ArtifactSink`]   | run messages and the final archive upload |

pub mod documentcloud;

use crate::error::{BillingError, TableExtractError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A document on the hosting platform. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque platform identifier.
    pub id: String,
    pub page_count: u32,
    /// URL-safe title fragment used in asset paths.
    #[serde(default)]
    pub slug: String,
    /// Base URL of the platform's asset host, with a trailing slash.
    #[serde(default)]
    pub asset_url: String,
}

impl Document {
    /// Check that the id is safe to use in workspace file names and archive
    /// entry names.
    pub fn check_id(&self) -> Result<(), TableExtractError> {
        let reason = if self.id.trim().is_empty() {
            "empty"
        } else if self.id.contains(['/', '\\']) {
            "contains a path separator"
        } else if self.id.contains("..") {
            "contains '..'"
        } else {
            return Ok(());
        };
        Err(TableExtractError::InvalidDocumentId {
            id: self.id.clone(),
            reason: reason.to_string(),
        })
    }
}

/// Where documents and their page images come from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// The documents the user selected for this run. Empty when none were.
    async fn selected_documents(&self) -> Result<Vec<Document>, TableExtractError>;

    /// URL of the rendered image for a 1-based page.
    fn page_image_url(&self, document: &Document, page: u32) -> String;
}

/// Credits set aside for a run by [`CreditLedger::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditHold {
    pub organization: String,
    pub amount: u64,
}

/// Two-phase billing: reserve before work, then capture or release.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Organization the run is billed to, if any.
    fn organization(&self) -> Option<String>;

    /// Set aside `amount` credits for this run.
    async fn reserve(&self, amount: u64) -> Result<CreditHold, BillingError>;

    /// Finalise a hold after the run completed.
    async fn capture(&self, hold: CreditHold) -> Result<(), BillingError>;

    /// Give a hold back after the run failed.
    async fn release(&self, hold: CreditHold) -> Result<(), BillingError>;
}

/// Where the run reports back to.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Publish the finished archive found at `path` under `name`.
    async fn upload(&self, name: &str, path: &Path) -> Result<(), TableExtractError>;

    /// Show a human-readable message on the run.
    async fn set_message(&self, message: &str) -> Result<(), TableExtractError>;
}
