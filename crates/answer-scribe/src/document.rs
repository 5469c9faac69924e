//! Document model: the heading, the extracted body and the reference section.

use crate::types::{Bibliography, CitationSet, ExtractedElement};
use serde::Serialize;

/// Marker placed before each list item in flat text renderings.
pub const BULLET: &str = "- ";

/// Title of the reference section.
pub const REFERENCES_HEADING: &str = "References";

/// One line of the reference section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceLine {
    pub number: u32,
    pub text: String,
}

impl ReferenceLine {
    /// `[n] citation`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.number, self.text)
    }
}

/// The final artifact handed to an emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub heading: String,
    pub body: Vec<ExtractedElement>,
    pub references: Vec<ReferenceLine>,
}

impl Document {
    /// Build the document for one run.
    ///
    /// References follow the citation set in ascending order; cited numbers
    /// without a resolved entry are left out.
    pub fn assemble(
        prompt: &str,
        body: Vec<ExtractedElement>,
        citations: &CitationSet,
        bibliography: &Bibliography,
    ) -> Self {
        let references = citations
            .iter()
            .filter_map(|n| {
                let entry = bibliography.get(n)?;
                Some(ReferenceLine {
                    number: n,
                    text: entry.citation(),
                })
            })
            .collect();

        Self {
            heading: prompt.trim().to_string(),
            body,
            references,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.references.is_empty()
    }
}

/// Column count of a table: its widest row.
pub fn table_width(rows: &[Vec<String>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

/// Lines of the text block that stands in for an image.
pub fn image_lines(url: &str, caption: &str, source: &str) -> Vec<String> {
    let mut lines = vec![format!("Image URL: {url}")];
    if !caption.is_empty() {
        lines.push(format!("Caption: {caption}"));
    }
    if !source.is_empty() {
        lines.push(format!("Source: {source}"));
    }
    lines
}
