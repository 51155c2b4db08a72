//! Records produced by a run.

use crate::error::HaltReason;
use serde::{Deserialize, Serialize};

/// One detected table on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    /// 1-based page the table was found on.
    pub page_number: u32,
    /// Cells in the order the analysis service returned them.
    pub cells: Vec<CellRecord>,
}

/// One table cell. Indices are 0-based and may be sparse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub row_index: u32,
    pub column_index: u32,
    pub content: String,
}

impl TableRecord {
    /// Grid height: highest `row_index` plus one, or 0 for an empty table.
    pub fn row_count(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.row_index as usize + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Per-document results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    /// Archive entry written for this document.
    pub file_name: String,
    pub pages_analyzed: usize,
    pub tables: usize,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub archive_name: String,
    /// Credits reserved and captured for this run.
    pub credits_charged: u64,
    pub documents: Vec<DocumentSummary>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn total_pages(&self) -> usize {
        self.documents.iter().map(|d| d.pages_analyzed).sum()
    }

    pub fn total_tables(&self) -> usize {
        self.documents.iter().map(|d| d.tables).sum()
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Archive built and uploaded.
    Completed(RunSummary),
    /// Stopped at the gate; nothing was analysed and no credits were kept.
    Halted(HaltReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, col: u32, content: &str) -> CellRecord {
        CellRecord {
            row_index: row,
            column_index: col,
            content: content.into(),
        }
    }

    #[test]
    fn row_count_uses_highest_index() {
        let table = TableRecord {
            page_number: 1,
            cells: vec![cell(0, 0, "a"), cell(3, 1, "b"), cell(1, 0, "c")],
        };
        assert_eq!(table.row_count(), 4);
    }

    #[test]
    fn row_count_of_empty_table_is_zero() {
        let table = TableRecord {
            page_number: 2,
            cells: vec![],
        };
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn summary_totals() {
        let summary = RunSummary {
            archive_name: "tables.zip".into(),
            credits_charged: 35,
            documents: vec![
                DocumentSummary {
                    document_id: "1".into(),
                    file_name: "tables-1.json".into(),
                    pages_analyzed: 3,
                    tables: 4,
                },
                DocumentSummary {
                    document_id: "2".into(),
                    file_name: "tables-2.json".into(),
                    pages_analyzed: 2,
                    tables: 0,
                },
            ],
            duration_ms: 10,
        };
        assert_eq!(summary.total_pages(), 5);
        assert_eq!(summary.total_tables(), 4);
    }
}
