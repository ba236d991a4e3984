//! Prose splitting using the text-splitter crate.

use text_splitter::TextSplitter;

/// Split prose into pieces of at most `chunk_size` characters on semantic
/// boundaries. Whitespace-only pieces are dropped.
pub fn split_prose(text: &str, chunk_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let splitter = TextSplitter::new(chunk_size.max(1));
    let chunks: Vec<String> = splitter
        .chunks(text)
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().to_string())
        .collect();

    tracing::trace!(
        "Text splitter created {} pieces from {} chars",
        chunks.len(),
        text.chars().count()
    );

    chunks
}
