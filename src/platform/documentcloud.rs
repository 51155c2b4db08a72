//! DocumentCloud REST adapter for the platform capabilities.
//!
//! One client implements [`DocumentSource`], [`CreditLedger`] and
//! [`ArtifactSink`] against the DocumentCloud API the add-on runs under.
//!
//! DocumentCloud only exposes a one-shot credit charge, so `reserve` charges
//! immediately, `capture` has nothing left to do, and `release` cannot
//! return credits on its own: it logs the amount so it can be refunded by
//! hand.

use super::{ArtifactSink, CreditHold, CreditLedger, Document, DocumentSource};
use crate::error::{BillingError, TableExtractError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Production API root.
pub const DEFAULT_API_BASE: &str = "https://api.www.documentcloud.org/api/";

/// DocumentCloud API client scoped to one add-on run.
pub struct DocumentCloudClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    document_ids: Vec<String>,
    organization: Option<String>,
    run_id: Option<String>,
    local_output: PathBuf,
}

impl DocumentCloudClient {
    /// Create a client for `api_base` (normalised to end with `/`).
    pub fn new(api_base: impl Into<String>, timeout_secs: u64) -> Result<Self, TableExtractError> {
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TableExtractError::Platform(e.to_string()))?;
        Ok(Self {
            http,
            api_base,
            token: None,
            document_ids: Vec::new(),
            organization: None,
            run_id: None,
            local_output: PathBuf::from("."),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_documents(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.document_ids = ids.into_iter().collect();
        self
    }

    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    /// Directory the archive is copied to when there is no add-on run to
    /// upload it to. Default: the current directory.
    pub fn with_local_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_output = dir.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn fetch_document(&self, id: &str) -> Result<Document, TableExtractError> {
        let url = self.url(&format!("documents/{id}/"));
        debug!("Fetching document metadata: {}", url);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|e| TableExtractError::Platform(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(TableExtractError::Platform(format!(
                "GET {url}: HTTP {}",
                response.status()
            )));
        }
        let body: DocumentResponse = response
            .json()
            .await
            .map_err(|e| TableExtractError::Platform(format!("document {id}: {e}")))?;
        Ok(body.into())
    }

    async fn patch_run(&self, body: serde_json::Value) -> Result<(), TableExtractError> {
        let Some(ref run_id) = self.run_id else {
            return Ok(());
        };
        let url = self.url(&format!("addon_runs/{run_id}/"));
        let response = self
            .authed(self.http.patch(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| TableExtractError::Platform(format!("PATCH {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(TableExtractError::Platform(format!(
                "PATCH {url}: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    id: serde_json::Value,
    page_count: u32,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    asset_url: String,
}

impl From<DocumentResponse> for Document {
    fn from(r: DocumentResponse) -> Self {
        let id = match r.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Document {
            id,
            page_count: r.page_count,
            slug: r.slug,
            asset_url: r.asset_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PresignedUpload {
    presigned_url: String,
}

/// Map a non-success credit charge response to a [`BillingError`].
fn billing_error(status: StatusCode, body: String) -> BillingError {
    if status == StatusCode::BAD_REQUEST || status == StatusCode::PAYMENT_REQUIRED {
        BillingError::InsufficientCredits(body)
    } else {
        BillingError::Api(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl DocumentSource for DocumentCloudClient {
    async fn selected_documents(&self) -> Result<Vec<Document>, TableExtractError> {
        let mut documents = Vec::with_capacity(self.document_ids.len());
        for id in &self.document_ids {
            documents.push(self.fetch_document(id).await?);
        }
        Ok(documents)
    }

    fn page_image_url(&self, document: &Document, page: u32) -> String {
        format!(
            "{}documents/{}/pages/{}-p{}-large.gif",
            document.asset_url, document.id, document.slug, page
        )
    }
}

#[async_trait]
impl CreditLedger for DocumentCloudClient {
    fn organization(&self) -> Option<String> {
        self.organization.clone()
    }

    async fn reserve(&self, amount: u64) -> Result<CreditHold, BillingError> {
        let org = self
            .organization
            .clone()
            .ok_or_else(|| BillingError::Api("no organization".into()))?;
        let url = self.url(&format!("organizations/{org}/ai_credits/"));
        let run = self.run_id.as_deref().unwrap_or("local");
        let body = json!({
            "ai_credits": amount,
            "addonrun_id": self.run_id,
            "note": format!("AddOn run: Table Extractor - {run}"),
        });

        let response = self
            .authed(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Api(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(billing_error(status, text));
        }

        info!("Charged {} AI credits to organization {}", amount, org);
        Ok(CreditHold {
            organization: org,
            amount,
        })
    }

    async fn capture(&self, hold: CreditHold) -> Result<(), BillingError> {
        debug!("Credits already charged at reservation: {}", hold.amount);
        Ok(())
    }

    async fn release(&self, hold: CreditHold) -> Result<(), BillingError> {
        warn!(
            "Run failed after charging {} AI credits to organization {}; \
             DocumentCloud has no refund endpoint, refund manually",
            hold.amount, hold.organization
        );
        Ok(())
    }
}

#[async_trait]
impl ArtifactSink for DocumentCloudClient {
    async fn upload(&self, name: &str, path: &Path) -> Result<(), TableExtractError> {
        let Some(ref run_id) = self.run_id else {
            let dest = self.local_output.join(name);
            tokio::fs::copy(path, &dest)
                .await
                .map_err(|e| TableExtractError::OutputWriteFailed {
                    path: dest.clone(),
                    source: e,
                })?;
            info!("No add-on run; archive written to {}", dest.display());
            return Ok(());
        };

        let upload_err = |reason: String| TableExtractError::UploadFailed {
            name: name.to_string(),
            reason,
        };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| upload_err(format!("reading {}: {e}", path.display())))?;

        let url = self.url(&format!("addon_runs/{run_id}/"));
        let presigned: PresignedUpload = self
            .authed(self.http.get(&url))
            .query(&[("upload_file", name)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upload_err(e.to_string()))?
            .json()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        self.http
            .put(&presigned.presigned_url)
            .body(bytes)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upload_err(e.to_string()))?;

        self.patch_run(json!({ "file_name": name })).await?;
        info!("Uploaded {} to add-on run {}", name, run_id);
        Ok(())
    }

    async fn set_message(&self, message: &str) -> Result<(), TableExtractError> {
        info!("Run message: {}", message);
        self.patch_run(json!({ "message": message })).await
    }
}
