//! Section and page labelling for parsed fragments.

use crate::types::{FragmentMetadata, RawFragment};
use std::path::Path;

/// Section label for fragments without a chapter, section or article line.
pub const UNCLASSIFIED_SECTION: &str = "未分類章節";

/// Title shown for a citation whose file is not in the source index.
pub const UNKNOWN_TITLE: &str = "未知文件";

const SECTION_MARKERS: [char; 3] = ['章', '節', '條'];

/// Return the first line containing 章, 節 or 條, trimmed.
pub fn extract_section(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.contains(SECTION_MARKERS))
        .map(|line| line.trim().to_string())
}

/// Display name of a document path.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Label one fragment. `position` is the 1-based place of the fragment
/// within its file.
pub fn label_fragment(path: &Path, position: u32, fragment: &RawFragment) -> FragmentMetadata {
    FragmentMetadata {
        file_name: file_name_of(path),
        file_path: Some(path.display().to_string()),
        page: Some(position),
        section: extract_section(&fragment.text),
    }
}
