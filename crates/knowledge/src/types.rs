//! Core types for the regulatory knowledge pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::metadata::UNCLASSIFIED_SECTION;

/// A fragment produced by a document parser, usually one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    pub text: String,
    /// Parser-reported position (1-based page number), if any
    pub index: Option<u32>,
}

impl RawFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            index: None,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }
}

/// Whether a unit holds a prose passage or a composite element such as a
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Base,
    Object,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Base => "base",
            UnitKind::Object => "object",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "base" => Some(UnitKind::Base),
            "object" => Some(UnitKind::Object),
            _ => None,
        }
    }
}

/// Metadata carried by every retrieval unit. All fields are always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetadata {
    pub file_name: String,
    pub file_path: String,
    pub page: u32,
    pub section: String,
}

/// Partially known metadata, completed by [`FragmentMetadata::complete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentMetadata {
    pub file_name: String,
    pub file_path: Option<String>,
    pub page: Option<u32>,
    pub section: Option<String>,
}

impl FragmentMetadata {
    /// Fill missing values: `file_path` from `file_name`, page `0`, and the
    /// unclassified section label.
    pub fn complete(self) -> UnitMetadata {
        let file_path = self
            .file_path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.file_name.clone());
        UnitMetadata {
            file_name: self.file_name,
            file_path,
            page: self.page.unwrap_or(0),
            section: self
                .section
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNCLASSIFIED_SECTION.to_string()),
        }
    }
}

/// The atomic thing the index stores and retrieves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalUnit {
    pub id: Uuid,
    pub text: String,
    /// Set once the unit has been embedded
    pub embedding: Option<Vec<f32>>,
    pub metadata: UnitMetadata,
    pub kind: UnitKind,
}

impl RetrievalUnit {
    pub fn new(text: impl Into<String>, metadata: UnitMetadata, kind: UnitKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            embedding: None,
            metadata,
            kind,
        }
    }
}

/// A unit returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUnit {
    pub unit: RetrievalUnit,
    /// L2 distance to the query vector
    pub distance: f32,
    /// Insertion position within the table, used to break distance ties
    pub seq: u64,
}

/// Provenance of one ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSourceEntry {
    pub title: String,
    pub path: String,
}

/// `file_path → entry`, one per distinct ingested file.
pub type SourceIndex = BTreeMap<String, DocumentSourceEntry>;

/// A citation derived from one retrieved unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSource {
    pub title: String,
    pub section: String,
    pub page: u32,
    /// First 100 characters of the unit text
    pub content: String,
    pub file_path: String,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub files: Vec<PathBuf>,
    pub fragments: usize,
    pub base_units: usize,
    pub object_units: usize,
    pub table: String,
    pub generation: u64,
    pub duration_secs: f64,
    pub completed_at: DateTime<Utc>,
}

impl IngestReport {
    pub fn unit_count(&self) -> usize {
        self.base_units + self.object_units
    }
}
