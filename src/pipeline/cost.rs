//! Credit cost of a run: pages analysed × credits per page.

use crate::config::PageRange;
use crate::platform::Document;

/// Total pages analysed across `documents` for `range`, each document
/// clamped to its own length.
pub fn pages_in_range(documents: &[Document], range: &PageRange) -> u64 {
    documents
        .iter()
        .map(|doc| range.page_count_for(doc.page_count))
        .sum()
}

/// Credits to reserve for analysing `range` of every document.
pub fn estimate_cost(documents: &[Document], range: &PageRange, credits_per_page: u64) -> u64 {
    pages_in_range(documents, range).saturating_mul(credits_per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CREDITS_PER_PAGE;

    fn doc(id: &str, page_count: u32) -> Document {
        Document {
            id: id.into(),
            page_count,
            slug: String::new(),
            asset_url: String::new(),
        }
    }

    #[test]
    fn single_document_within_length() {
        let docs = [doc("a", 5)];
        assert_eq!(
            estimate_cost(&docs, &PageRange::new(1, 3), DEFAULT_CREDITS_PER_PAGE),
            21
        );
    }

    #[test]
    fn end_page_clamped_to_document_length() {
        let docs = [doc("a", 2)];
        assert_eq!(pages_in_range(&docs, &PageRange::new(1, 10)), 2);
        assert_eq!(
            estimate_cost(&docs, &PageRange::new(1, 10), DEFAULT_CREDITS_PER_PAGE),
            14
        );
    }

    #[test]
    fn documents_are_clamped_independently() {
        let docs = [doc("long", 40), doc("short", 3), doc("mid", 6)];
        // 2..=5 → 4 + 2 + 4
        assert_eq!(pages_in_range(&docs, &PageRange::new(2, 5)), 10);
        assert_eq!(estimate_cost(&docs, &PageRange::new(2, 5), 7), 70);
    }

    #[test]
    fn document_shorter_than_start_costs_nothing() {
        let docs = [doc("short", 2), doc("long", 10)];
        assert_eq!(pages_in_range(&docs, &PageRange::new(5, 6)), 2);
    }

    #[test]
    fn inverted_range_is_never_negative() {
        let docs = [doc("a", 10)];
        assert_eq!(estimate_cost(&docs, &PageRange::new(6, 2), 7), 0);
    }

    #[test]
    fn no_documents_cost_nothing() {
        assert_eq!(estimate_cost(&[], &PageRange::new(1, 3), 7), 0);
    }
}
