//! Citation collection and rendering.

use crate::metadata::{UNCLASSIFIED_SECTION, UNKNOWN_TITLE};
use crate::types::{DocumentSource, RetrievalUnit, SourceIndex};
use std::collections::HashSet;

/// Characters of unit text kept as the citation preview and dedup key.
pub const PREVIEW_CHARS: usize = 100;

/// Header line between the answer body and the citation block.
pub const SOURCES_HEADER: &str = "「參考來源」";

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// One citation per distinct text preview, in `units` order.
///
/// Titles are resolved through `sources` by file path.
pub fn collect_sources(units: &[RetrievalUnit], sources: &SourceIndex) -> Vec<DocumentSource> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for unit in units {
        let content = preview(&unit.text);
        if !seen.insert(content.clone()) {
            continue;
        }

        let title = sources
            .get(&unit.metadata.file_path)
            .map(|entry| entry.title.clone())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        out.push(DocumentSource {
            title,
            section: unit.metadata.section.clone(),
            page: unit.metadata.page,
            content,
            file_path: unit.metadata.file_path.clone(),
        });
    }

    out
}

/// Append the citation block to `answer`.
///
/// Citations sharing `(title, section, page)` collapse to the first one.
pub fn render(answer: &str, sources: &[DocumentSource]) -> String {
    let mut out = format!("{}\n\n{}\n", answer, SOURCES_HEADER);
    let mut seen = HashSet::new();

    for source in sources {
        if !seen.insert((source.title.as_str(), source.section.as_str(), source.page)) {
            continue;
        }

        out.push_str(&format!("◆ 《{}》", source.title));
        if source.section != UNCLASSIFIED_SECTION {
            out.push_str(&format!("【{}】", source.section));
        }
        if source.page > 0 {
            out.push_str(&format!(" 第{}頁", source.page));
        }
        out.push_str(&format!("\n  相關內容：{}\n", source.content));
    }

    out
}
