//! Output format selection and document saving.

use answer_scribe::{persist, Capture, Document, DocumentEmitter, DocxEmitter, JsonEmitter};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Format of the saved answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Word document
    Docx,
    /// JSON rendering of the same document model
    Json,
}

impl OutputFormat {
    pub fn emitter(self) -> Box<dyn DocumentEmitter> {
        match self {
            Self::Docx => Box::new(DocxEmitter),
            Self::Json => Box::new(JsonEmitter),
        }
    }
}

/// Where and how to save the document.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub dir: PathBuf,
    pub prefix: String,
}

/// Save `doc`. A failure is logged and reported as `None`; the run still
/// counts as complete.
pub fn save_document(doc: &Document, output: &OutputOptions) -> Option<PathBuf> {
    let emitter = output.format.emitter();
    match persist(emitter.as_ref(), doc, &output.dir, &output.prefix) {
        Ok(path) => {
            info!("document saved as {}", path.display());
            Some(path)
        }
        Err(e) => {
            error!("failed to save document: {e}");
            None
        }
    }
}

/// Log how the capture went.
pub fn log_capture(capture: &Capture) {
    info!(
        "capture: {:?}{}, {} block(s), {} element(s), {} duplicate(s) skipped",
        capture.termination,
        if capture.reloaded { " after reload" } else { "" },
        capture.blocks_seen,
        capture.document.body.len(),
        capture.duplicates_skipped
    );
    let missing = capture.unresolved();
    if missing.is_empty() {
        info!(
            "references: {} of {} cited ({:?})",
            capture.document.references.len(),
            capture.citations.len(),
            capture.resolve_stop
        );
    } else {
        warn!(
            "references: {} of {} cited ({:?}), missing {missing:?}",
            capture.document.references.len(),
            capture.citations.len(),
            capture.resolve_stop
        );
    }
}

/// Ensure the output directory can be created; used by `doctor`.
pub fn check_output_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(format!(".scribe-probe-{}", std::process::id()));
    std::fs::write(&probe, b"")?;
    std::fs::remove_file(&probe)
}
