//! Page image normalisation: download a page image and re-encode it as PNG.
//!
//! DocumentCloud serves page renders as GIF; the layout model wants PNG.
//! The conversion is a format change only: pixels are decoded and written
//! back out losslessly, never resized.
//!
//! Both the raw download and the PNG are kept in the run workspace as
//! `<id>-page<n>.gif` / `<id>-page<n>.png` until the workspace is dropped.

use crate::error::TableExtractError;
use crate::platform::{Document, DocumentSource};
use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Fetches raw page image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TableExtractError>;
}

/// HTTP fetcher with a fixed per-request timeout.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, TableExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TableExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TableExtractError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TableExtractError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                TableExtractError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(TableExtractError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TableExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }
}

/// Fetches page images and converts them to PNG inside a workspace dir.
pub struct ImageNormalizer<'a> {
    source: &'a dyn DocumentSource,
    fetcher: &'a dyn ImageFetcher,
    workspace: &'a Path,
}

impl<'a> ImageNormalizer<'a> {
    pub fn new(
        source: &'a dyn DocumentSource,
        fetcher: &'a dyn ImageFetcher,
        workspace: &'a Path,
    ) -> Self {
        Self {
            source,
            fetcher,
            workspace,
        }
    }

    /// Download one page and return its PNG bytes.
    pub async fn normalize(
        &self,
        document: &Document,
        page: u32,
    ) -> Result<Vec<u8>, TableExtractError> {
        let url = self.source.page_image_url(document, page);
        debug!("Fetching page {} of {}: {}", page, document.id, url);
        let raw = self.fetcher.fetch(&url).await?;

        let raw_path = self
            .workspace
            .join(format!("{}-page{}.gif", document.id, page));
        write_file(&raw_path, &raw).await?;

        let png = convert_to_png(&raw).map_err(|e| TableExtractError::ImageConversion {
            document: document.id.clone(),
            page,
            detail: e.to_string(),
        })?;

        let png_path = self
            .workspace
            .join(format!("{}-page{}.png", document.id, page));
        write_file(&png_path, &png).await?;
        debug!("Page {} → {} bytes PNG", page, png.len());
        Ok(png)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TableExtractError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| TableExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Decode any supported raster image and re-encode it as PNG.
pub fn convert_to_png(raw: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(raw)?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
