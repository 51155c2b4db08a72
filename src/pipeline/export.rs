//! Export a document's tables as JSON or CSV, and bundle exports into a zip.
//!
//! ## CSV layout
//!
//! Each table becomes one block:
//!
//! ```text
//! Page Number:,3
//! <row 0 cells>
//! <row 1 cells>
//! …
//! <blank>
//! <blank>
//! ```
//!
//! The block has `max(row_index) + 1` grid rows. With the default
//! [`CellPlacement::Arrival`] a cell's content is appended to its row in the
//! order the service returned it, so `column_index` does not affect layout;
//! [`CellPlacement::Column`] puts every cell at its column instead.

use crate::config::CellPlacement;
use crate::error::TableExtractError;
use crate::output::TableRecord;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Rows of one CSV file; fields are already strings.
pub type CsvRows = Vec<Vec<String>>;

/// Serialise a document's tables as JSON indented by four spaces.
pub fn to_json(tables: &[TableRecord]) -> Result<String, TableExtractError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    tables.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| TableExtractError::Internal(e.to_string()))
}

/// Flatten a document's tables into CSV rows.
pub fn to_csv_rows(tables: &[TableRecord], placement: CellPlacement) -> CsvRows {
    let mut out = CsvRows::new();
    for table in tables {
        out.push(vec!["Page Number:".to_string(), table.page_number.to_string()]);
        out.extend(table_grid(table, placement));
        out.push(Vec::new());
        out.push(Vec::new());
    }
    out
}

fn table_grid(table: &TableRecord, placement: CellPlacement) -> CsvRows {
    let mut rows: CsvRows = vec![Vec::new(); table.row_count()];
    for cell in &table.cells {
        let row = &mut rows[cell.row_index as usize];
        match placement {
            CellPlacement::Arrival => row.push(cell.content.clone()),
            CellPlacement::Column => {
                let col = cell.column_index as usize;
                if row.len() <= col {
                    row.resize(col + 1, String::new());
                }
                row[col] = cell.content.clone();
            }
        }
    }
    rows
}

/// Append rows to the CSV file at `path`, creating it if needed.
///
/// Records are CRLF-terminated and may differ in length. An empty row is
/// written as a bare line break.
pub fn append_csv(path: &Path, rows: &CsvRows) -> Result<(), TableExtractError> {
    let write_err = |e: std::io::Error| TableExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(&file);

    for row in rows {
        if row.is_empty() {
            writer.flush().map_err(write_err)?;
            (&file).write_all(b"\r\n").map_err(write_err)?;
        } else {
            writer.write_record(row)?;
        }
    }

    // Check for error rather than implicitly flushing and ignoring.
    writer.flush().map_err(write_err)?;
    Ok(())
}

/// The run's zip archive, written incrementally and finished once.
pub struct ArchiveWriter {
    zip: ZipWriter<File>,
    path: PathBuf,
    entries: Vec<String>,
}

impl ArchiveWriter {
    /// Create (or truncate) the archive at `path`.
    pub fn create(path: &Path) -> Result<Self, TableExtractError> {
        let file = File::create(path).map_err(|e| TableExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            zip: ZipWriter::new(file),
            path: path.to_path_buf(),
            entries: Vec::new(),
        })
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// Add an entry from memory.
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), TableExtractError> {
        self.zip.start_file(name, Self::options())?;
        self.zip
            .write_all(bytes)
            .map_err(|e| TableExtractError::OutputWriteFailed {
                path: self.path.clone(),
                source: e,
            })?;
        debug!("Archived {} ({} bytes)", name, bytes.len());
        self.entries.push(name.to_string());
        Ok(())
    }

    /// Add an entry by reading back a file already on disk.
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<(), TableExtractError> {
        let bytes = std::fs::read(source).map_err(|e| TableExtractError::OutputWriteFailed {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.add_bytes(name, &bytes)
    }

    /// Entry names written so far, in order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Write the central directory and close the file.
    pub fn finish(self) -> Result<PathBuf, TableExtractError> {
        let mut file = self.zip.finish()?;
        file.flush()
            .map_err(|e| TableExtractError::OutputWriteFailed {
                path: self.path.clone(),
                source: e,
            })?;
        Ok(self.path)
    }
}
