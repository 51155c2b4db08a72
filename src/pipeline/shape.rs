//! Reshape a raw analysis result into [`TableRecord`]s.

use crate::output::{CellRecord, TableRecord};
use crate::pipeline::analyze::AnalysisResult;

/// One record per detected table, tables and cells kept in service order.
pub fn shape_page(result: &AnalysisResult, page_number: u32) -> Vec<TableRecord> {
    result
        .tables
        .iter()
        .map(|table| TableRecord {
            page_number,
            cells: table
                .cells
                .iter()
                .map(|cell| CellRecord {
                    row_index: cell.row_index,
                    column_index: cell.column_index,
                    content: cell.content.clone(),
                })
                .collect(),
        })
        .collect()
}
