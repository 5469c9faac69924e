//! Core data types shared by the stabilization, extraction and emission stages.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Serialized markup of every matched content block, in DOM order.
///
/// One snapshot is produced per poll tick and superseded by the next one.
/// Only its length is compared between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    markup: String,
}

impl Snapshot {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.markup
    }

    /// Length in bytes of the combined markup.
    pub fn len(&self) -> usize {
        self.markup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }

    pub fn into_string(self) -> String {
        self.markup
    }
}

/// Distinct citation numbers referenced by the answer text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSet(BTreeSet<u32>);

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, number: u32) -> bool {
        self.0.insert(number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.0.contains(&number)
    }

    /// Numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn max(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for CitationSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Metadata read from one row of the reference list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Normalized index label, e.g. `"12"` for a row labelled `12.`
    pub number: String,
    pub authors: Vec<String>,
    pub date: String,
    pub title: String,
    pub journal: String,
}

impl ReferenceEntry {
    /// Compose the single-line citation: `authors. date. title. journal.`
    ///
    /// Empty parts are left out rather than rendered as stray separators.
    pub fn citation(&self) -> String {
        let authors = self
            .authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let parts: Vec<&str> = [
            authors.as_str(),
            self.date.trim(),
            self.title.trim(),
            self.journal.trim(),
        ]
        .into_iter()
        .map(|p| p.trim_end_matches('.'))
        .filter(|p| !p.is_empty())
        .collect();

        if parts.is_empty() {
            String::new()
        } else {
            format!("{}.", parts.join(". "))
        }
    }
}

/// Resolved references keyed by their normalized number.
///
/// Entries are write-once: a number that has been resolved is never
/// re-extracted or overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bibliography {
    entries: BTreeMap<String, ReferenceEntry>,
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry. Returns `false` (and keeps the first entry) when the
    /// number is already resolved.
    pub fn insert(&mut self, entry: ReferenceEntry) -> bool {
        if self.entries.contains_key(&entry.number) {
            return false;
        }
        self.entries.insert(entry.number.clone(), entry);
        true
    }

    pub fn contains(&self, number: &str) -> bool {
        self.entries.contains_key(number)
    }

    pub fn get(&self, number: u32) -> Option<&ReferenceEntry> {
        self.entries.get(&number.to_string())
    }

    /// Whether every cited number has a resolved entry.
    pub fn covers(&self, citations: &CitationSet) -> bool {
        citations.iter().all(|n| self.get(n).is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An image found in the answer body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub caption: String,
    pub source: String,
}

/// One typed unit of extracted answer content, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedElement {
    Paragraph { text: String },
    ListBlock { items: Vec<String> },
    Table { rows: Vec<Vec<String>> },
    ImageRef(ImageRef),
}

/// How a fault affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Browser, session or navigation failure. Fatal.
    Setup,
    /// The prompt could not be submitted. Fatal.
    Interaction,
    /// A query, scroll or reload failed during a polling loop. Recoverable.
    Polling,
    /// A block or element could not be extracted. Recoverable.
    Extraction,
    /// The document could not be written. Recoverable.
    Persistence,
}

/// Errors raised by the core.
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Page session closed: {0}")]
    SessionClosed(String),

    #[error("Prompt submission failed: {0}")]
    Submission(String),

    #[error("Locator configuration error: {0}")]
    Config(String),

    #[error("Page query failed: {0}")]
    Page(String),

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Failed to persist document: {0}")]
    Persist(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScribeError {
    pub fn class(&self) -> FaultClass {
        match self {
            Self::Launch(_) | Self::Navigation(_) | Self::SessionClosed(_) | Self::Config(_) => {
                FaultClass::Setup
            }
            Self::Submission(_) => FaultClass::Interaction,
            Self::Page(_) | Self::Timeout { .. } => FaultClass::Polling,
            Self::Selector { .. } | Self::Extraction(_) => FaultClass::Extraction,
            Self::Persist(_) | Self::Io(_) | Self::Json(_) => FaultClass::Persistence,
        }
    }

    /// Setup and interaction faults abort the run; everything else is
    /// logged and skipped where it happens.
    pub fn is_fatal(&self) -> bool {
        matches!(self.class(), FaultClass::Setup | FaultClass::Interaction)
    }
}

/// Convenience result type.
pub type ScribeResult<T> = Result<T, ScribeError>;
