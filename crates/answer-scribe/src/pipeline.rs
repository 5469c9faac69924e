//! Capture pipeline. Everything that happens after the prompt is submitted:
//! settle, scan citations, resolve references, extract and assemble.

use crate::citations::scan_citations;
use crate::document::Document;
use crate::extractor::Extractor;
use crate::locators::LocatorTable;
use crate::page::LivePage;
use crate::references::{resolve_references, ResolveStop, ResolverConfig};
use crate::stabilizer::{wait_for_stable_content, StabilizerConfig, Termination};
use crate::types::CitationSet;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub stabilizer: StabilizerConfig,
    pub resolver: ResolverConfig,
}

impl CaptureConfig {
    /// No delays anywhere; for recorded pages.
    pub fn immediate() -> Self {
        Self {
            stabilizer: StabilizerConfig::immediate(),
            resolver: ResolverConfig::immediate(),
        }
    }
}

/// Result of one capture, with the counters worth logging.
#[derive(Debug, Clone)]
pub struct Capture {
    pub document: Document,
    pub citations: CitationSet,
    pub termination: Termination,
    pub reloaded: bool,
    pub resolve_stop: ResolveStop,
    pub blocks_seen: usize,
    pub duplicates_skipped: usize,
}

impl Capture {
    /// Cited numbers that did not make it into the reference section.
    pub fn unresolved(&self) -> Vec<u32> {
        self.citations
            .iter()
            .filter(|n| !self.document.references.iter().any(|r| r.number == *n))
            .collect()
    }
}

/// Run every post-submission stage against `page`. Never fails; degraded
/// stages show up in the returned counters.
pub async fn capture_answer(
    page: &dyn LivePage,
    locators: &LocatorTable,
    prompt: &str,
    config: &CaptureConfig,
) -> Capture {
    let report = wait_for_stable_content(page, locators, &config.stabilizer).await;

    let citations = scan_citations(report.snapshot.as_str());
    info!("found {} distinct citation(s)", citations.len());

    let resolution = resolve_references(page, locators, &citations, &config.resolver).await;

    let extraction = Extractor::new(locators).extract(report.snapshot.as_str());
    info!(
        "extracted {} element(s), {} duplicate(s) skipped",
        extraction.elements.len(),
        extraction.duplicates_skipped
    );

    let document = Document::assemble(
        prompt,
        extraction.elements,
        &citations,
        &resolution.bibliography,
    );

    Capture {
        document,
        citations,
        termination: report.termination,
        reloaded: report.reloaded,
        resolve_stop: resolution.stop,
        blocks_seen: extraction.blocks_seen,
        duplicates_skipped: extraction.duplicates_skipped,
    }
}
