//! Table analysis: submit a page image to the layout model and wait for it.
//!
//! The service is asynchronous on its side: `POST …:analyze` answers
//! `202 Accepted` with an `Operation-Location` header, and the result is
//! fetched by polling that URL until its `status` leaves `running`. From the
//! driver's point of view the call is a single blocking step; there is no
//! retry on failure.

use crate::config::{AnalysisCredentials, RunConfig};
use crate::error::TableExtractError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";

/// Raw analysis output for one page: the tables the model detected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub tables: Vec<AnalyzedTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedTable {
    #[serde(default)]
    pub cells: Vec<AnalyzedCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedCell {
    pub row_index: u32,
    pub column_index: u32,
    #[serde(default)]
    pub content: String,
}

/// The analysis service, as seen by the driver.
#[async_trait]
pub trait TableAnalyzer: Send + Sync {
    /// Analyse one PNG page image and return the detected tables.
    async fn analyze(&self, page: u32, png: &[u8]) -> Result<AnalysisResult, TableExtractError>;
}

/// Azure Document Intelligence client for the layout model.
pub struct AzureLayoutAnalyzer {
    client: reqwest::Client,
    analyze_url: String,
    key: String,
    poll_interval: Duration,
}

impl AzureLayoutAnalyzer {
    /// Authenticate against `credentials.endpoint` using the model and API
    /// version from `config`.
    pub fn new(
        credentials: &AnalysisCredentials,
        config: &RunConfig,
    ) -> Result<Self, TableExtractError> {
        if credentials.endpoint.trim().is_empty() || credentials.key.trim().is_empty() {
            return Err(TableExtractError::InvalidConfig(
                "analysis endpoint and key are required".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| TableExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            analyze_url: analyze_url(&credentials.endpoint, &config.model_id, &config.api_version),
            key: credentials.key.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    /// Start an analysis. Returns the operation URL and the service's
    /// requested wait before the first poll, if any.
    async fn submit(&self, png: &[u8]) -> Result<(String, Option<Duration>), TableExtractError> {
        let response = self
            .client
            .post(&self.analyze_url)
            .header(KEY_HEADER, &self.key)
            .header(CONTENT_TYPE, "image/png")
            .body(png.to_vec())
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let operation = operation_location(response.headers())?;
        Ok((operation, retry_after(response.headers())))
    }

    async fn poll(
        &self,
        page: u32,
        operation: &str,
        first_wait: Option<Duration>,
    ) -> Result<AnalysisResult, TableExtractError> {
        let mut wait = first_wait.unwrap_or(self.poll_interval);
        loop {
            sleep(wait).await;

            let response = self
                .client
                .get(operation)
                .header(KEY_HEADER, &self.key)
                .send()
                .await
                .map_err(transport_error)?;
            let response = check_status(response).await?;
            wait = retry_after(response.headers()).unwrap_or(self.poll_interval);

            let body: OperationStatus =
                response
                    .json()
                    .await
                    .map_err(|e| TableExtractError::AnalysisApi {
                        message: format!("malformed analysis response: {e}"),
                    })?;

            match poll_step(body, page)? {
                PollStep::Done(result) => return Ok(result),
                PollStep::Pending => debug!("Page {}: analysis still running", page),
            }
        }
    }
}

#[async_trait]
impl TableAnalyzer for AzureLayoutAnalyzer {
    async fn analyze(&self, page: u32, png: &[u8]) -> Result<AnalysisResult, TableExtractError> {
        let start = Instant::now();
        let (operation, first_wait) = self.submit(png).await?;
        let result = self.poll(page, &operation, first_wait).await?;
        info!(
            "Page {}: {} tables in {:?}",
            page,
            result.tables.len(),
            start.elapsed()
        );
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalysisResult>,
}

/// What one poll response means for the polling loop.
#[derive(Debug, PartialEq)]
enum PollStep {
    Done(AnalysisResult),
    Pending,
}

fn poll_step(body: OperationStatus, page: u32) -> Result<PollStep, TableExtractError> {
    match body.status.as_str() {
        "succeeded" => Ok(PollStep::Done(body.analyze_result.unwrap_or_default())),
        "failed" | "canceled" => Err(TableExtractError::AnalysisFailed {
            page,
            status: body.status,
        }),
        // notStarted, running
        _ => Ok(PollStep::Pending),
    }
}

fn operation_location(headers: &HeaderMap) -> Result<String, TableExtractError> {
    headers
        .get(OPERATION_LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| TableExtractError::AnalysisApi {
            message: "response has no Operation-Location header".into(),
        })
}

fn analyze_url(endpoint: &str, model_id: &str, api_version: &str) -> String {
    format!(
        "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
        endpoint.trim_end_matches('/'),
        model_id,
        api_version
    )
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn transport_error(e: reqwest::Error) -> TableExtractError {
    TableExtractError::AnalysisApi {
        message: e.to_string(),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TableExtractError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let wait = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, wait, body))
}

/// Map a non-success HTTP status to the matching fatal error.
fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> TableExtractError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TableExtractError::AuthError {
            detail: format!("HTTP {status}: {body}"),
        },
        StatusCode::TOO_MANY_REQUESTS => TableExtractError::RateLimitExceeded {
            retry_after_secs: retry_after.map(|d| d.as_secs()),
        },
        _ => TableExtractError::AnalysisApi {
            message: format!("HTTP {status}: {body}"),
        },
    }
}
