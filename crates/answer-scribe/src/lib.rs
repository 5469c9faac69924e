// Copyright 2026 Scribe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Answer Scribe: settle a streamed answer page, extract its content and
//! references, and emit them as a document.

pub mod citations;
pub mod document;
pub mod emitter;
pub mod extractor;
pub mod locators;
pub mod page;
pub mod pipeline;
pub mod references;
pub mod replay;
pub mod snapshot;
pub mod stabilizer;
pub mod types;

pub use citations::scan_citations;
pub use document::{Document, ReferenceLine};
pub use emitter::{persist, DocumentEmitter, DocxEmitter, JsonEmitter, DEFAULT_PREFIX};
pub use extractor::{Extraction, Extractor};
pub use locators::{LocatorTable, Role};
pub use page::{LivePage, PageElement, SelectorState};
pub use pipeline::{capture_answer, Capture, CaptureConfig};
pub use references::{resolve_references, Resolution, ResolveStop, ResolverConfig};
pub use replay::ReplayPage;
pub use snapshot::collect_snapshot;
pub use stabilizer::{
    wait_for_stable_content, StabilizationReport, StabilizerConfig, Termination,
};
pub use types::*;
