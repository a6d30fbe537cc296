use crate::document::{is_present, Document};

/// Number of informative fields a document has populated.
///
/// Counts one point each for abstract, cluster id, drive url, summary, macro category,
/// authors, year and the analysis marker. Strings count when non-blank, lists when
/// non-empty, scalars when set. The embedding is never counted.
pub fn completeness_score(document: &Document) -> u32 {
    [
        is_present(document.abstract_text.as_deref()),
        document.cluster_id.is_some(),
        is_present(document.drive_url.as_deref()),
        is_present(document.document_summary.as_deref()),
        is_present(document.macro_category.as_deref()),
        !document.authors.is_empty(),
        document.year.is_some(),
        is_present(document.research_question.as_deref()),
    ]
    .into_iter()
    .map(u32::from)
    .sum()
}
