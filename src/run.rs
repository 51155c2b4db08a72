//! The run driver: gate, analyse every page in range, export, upload.
//!
//! ## Billing protocol
//!
//! Credits are handled in two phases around the paid work:
//!
//! ```text
//! gate ── reserve ──▶ execute ──┬─ Ok  ──▶ capture
//!                               └─ Err ──▶ release, then return the error
//! ```
//!
//! so a fatal error part-way through a document set never silently keeps the
//! customer's credits.
//!
//! ## Local files
//!
//! Page images, CSV exports and the archive are written to one
//! [`tempfile::TempDir`] per run. It is removed when [`run`] returns, on
//! success and on every error path.

use crate::config::{OutputFormat, RunConfig};
use crate::error::TableExtractError;
use crate::output::{DocumentSummary, RunOutcome, RunSummary, TableRecord};
use crate::pipeline::analyze::TableAnalyzer;
use crate::pipeline::export::{self, ArchiveWriter};
use crate::pipeline::gate::{self, GateOutcome};
use crate::pipeline::normalize::{ImageFetcher, ImageNormalizer};
use crate::pipeline::{cost, shape};
use crate::platform::{ArtifactSink, CreditLedger, Document, DocumentSource};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything the driver talks to outside the process.
pub struct Capabilities<'a> {
    pub documents: &'a dyn DocumentSource,
    pub ledger: &'a dyn CreditLedger,
    pub sink: &'a dyn ArtifactSink,
    pub fetcher: &'a dyn ImageFetcher,
    pub analyzer: &'a dyn TableAnalyzer,
}

/// Run one table extraction over the selected documents.
///
/// # Returns
/// * `Ok(RunOutcome::Completed(_))`: the archive was uploaded
/// * `Ok(RunOutcome::Halted(_))`: the gate stopped the run; the reason's
///   message has been set on the run and no credits were kept
///
/// # Errors
/// * A document id that is unusable as a file name, before anything is
///   reserved
/// * Any failure after the gate (download, image conversion, analysis,
///   local I/O, upload). The credit hold is released before the error is
///   returned.
pub async fn run(
    config: &RunConfig,
    caps: &Capabilities<'_>,
) -> Result<RunOutcome, TableExtractError> {
    let start = Instant::now();
    info!("Starting table extraction: {:?}", config.page_range);

    // ── Step 1: Load selection ───────────────────────────────────────────
    let documents = dedup_documents(caps.documents.selected_documents().await?);
    for document in &documents {
        document.check_id()?;
    }
    debug!("{} documents selected", documents.len());

    // ── Step 2: Gate + reserve ───────────────────────────────────────────
    let outcome = gate::evaluate(
        &documents,
        &config.page_range,
        config.credits_per_page,
        caps.ledger,
    )
    .await;
    let hold = match outcome {
        GateOutcome::Proceed(hold) => hold,
        GateOutcome::Halt(reason) => {
            info!("Run halted: {}", reason);
            if let Err(e) = caps.sink.set_message(&reason.to_string()).await {
                warn!("Could not set run message: {}", e);
            }
            return Ok(RunOutcome::Halted(reason));
        }
    };
    let credits_charged = hold.amount;

    // ── Step 3: Execute, then capture or release ─────────────────────────
    let summaries = match execute(config, caps, &documents).await {
        Ok(summaries) => {
            if let Err(e) = caps.ledger.capture(hold).await {
                warn!("Could not capture credit hold: {}", e);
            }
            summaries
        }
        Err(e) => {
            warn!("Run failed, releasing {} credits: {}", credits_charged, e);
            if let Err(release_err) = caps.ledger.release(hold).await {
                warn!("Could not release credit hold: {}", release_err);
            }
            return Err(e);
        }
    };

    let summary = RunSummary {
        archive_name: config.archive_name.clone(),
        credits_charged,
        documents: summaries,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Run complete: {} documents, {} pages, {} tables, {}ms",
        summary.documents.len(),
        summary.total_pages(),
        summary.total_tables(),
        summary.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(summary.total_pages(), summary.total_tables());
    }

    Ok(RunOutcome::Completed(summary))
}

/// Drop repeated document ids, keeping the first occurrence of each.
///
/// Every id names one archive entry, so a repeat would be billed and then
/// fail when the archive is written.
fn dedup_documents(documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| {
            let first = seen.insert(doc.id.clone());
            if !first {
                warn!("Document {} selected more than once; processing it once", doc.id);
            }
            first
        })
        .collect()
}

/// The paid part of the run. Everything lives in a scoped workspace.
async fn execute(
    config: &RunConfig,
    caps: &Capabilities<'_>,
    documents: &[Document],
) -> Result<Vec<DocumentSummary>, TableExtractError> {
    let workspace = tempfile::Builder::new()
        .prefix("dc-tables-")
        .tempdir()
        .map_err(|e| TableExtractError::OutputWriteFailed {
            path: std::env::temp_dir(),
            source: e,
        })?;
    let normalizer = ImageNormalizer::new(caps.documents, caps.fetcher, workspace.path());
    let mut archive = ArchiveWriter::create(&workspace.path().join(&config.archive_name))?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(cost::pages_in_range(documents, &config.page_range) as usize);
    }

    let mut summaries = Vec::with_capacity(documents.len());
    for document in documents {
        let mut tables: Vec<TableRecord> = Vec::new();
        let mut pages_analyzed = 0;

        for page in config.page_range.pages_for(document.page_count) {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(&document.id, page);
            }
            let png = normalizer.normalize(document, page).await?;
            let result = caps.analyzer.analyze(page, &png).await?;
            let shaped = shape::shape_page(&result, page);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(&document.id, page, shaped.len());
            }
            tables.extend(shaped);
            pages_analyzed += 1;
        }

        let file_name = config.output_format.file_name(&document.id);
        export_document(config, &mut archive, workspace.path(), &file_name, &tables)?;
        info!(
            "Document {}: {} pages, {} tables → {}",
            document.id,
            pages_analyzed,
            tables.len(),
            file_name
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_complete(&document.id, tables.len());
        }

        summaries.push(DocumentSummary {
            document_id: document.id.clone(),
            file_name,
            pages_analyzed,
            tables: tables.len(),
        });
    }

    let archive_path = archive.finish()?;
    caps.sink.upload(&config.archive_name, &archive_path).await?;
    Ok(summaries)
}

/// Write one document's export into the archive.
///
/// JSON goes straight from memory; CSV is appended to a workspace file
/// first and read back into the archive.
fn export_document(
    config: &RunConfig,
    archive: &mut ArchiveWriter,
    workspace: &Path,
    file_name: &str,
    tables: &[TableRecord],
) -> Result<(), TableExtractError> {
    match config.output_format {
        OutputFormat::Json => {
            let json = export::to_json(tables)?;
            archive.add_bytes(file_name, json.as_bytes())
        }
        OutputFormat::Csv => {
            let path = workspace.join(file_name);
            export::append_csv(&path, &export::to_csv_rows(tables, config.cell_placement))?;
            archive.add_file(file_name, &path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, page_count: u32) -> Document {
        Document {
            id: id.into(),
            page_count,
            slug: String::new(),
            asset_url: String::new(),
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let docs = dedup_documents(vec![doc("7", 1), doc("8", 2), doc("7", 9), doc("9", 3)]);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8", "9"]);
        assert_eq!(docs[0].page_count, 1);
    }

    #[test]
    fn dedup_of_unique_selection_is_unchanged() {
        let docs = vec![doc("a", 1), doc("b", 1)];
        assert_eq!(dedup_documents(docs.clone()), docs);
    }
}
