//! Element-aware decomposition of parsed fragments.
//!
//! A fragment's markdown is split into prose elements (`base` units) and
//! composite elements such as tables (`object` units).

mod markdown;
mod table_summary;
mod text;

pub use markdown::MarkdownElementDecomposer;
pub use table_summary::TableSummarizer;
pub use text::split_prose;

use crate::types::UnitKind;
use hr_core::AppResult;

/// One structural element of a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: UnitKind,
    pub text: String,
}

impl Element {
    pub fn base(text: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Base,
            text: text.into(),
        }
    }

    pub fn object(text: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Object,
            text: text.into(),
        }
    }
}

/// Splits one fragment's text into elements, in document order.
///
/// Implementations are called from blocking worker threads.
pub trait ElementDecomposer: Send + Sync {
    fn decompose(&self, text: &str) -> AppResult<Vec<Element>>;
}
