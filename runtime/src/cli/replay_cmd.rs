//! `scribe replay`: run the capture pipeline over saved page markup.
//!
//! Each `--html` file is one frame; scrolling moves to the next frame, the
//! way a virtualized list renders new rows. Nothing is submitted and no
//! browser is started.

use crate::cli::output::{log_capture, save_document, OutputOptions};
use answer_scribe::{capture_answer, Capture, CaptureConfig, LocatorTable, ReplayPage};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn run(
    frames: &[PathBuf],
    prompt: &str,
    locators: &LocatorTable,
    output: &OutputOptions,
) -> Result<(Capture, Option<PathBuf>)> {
    let page = load_frames(frames)?;
    info!("replaying {} recorded frame(s)", frames.len());

    let capture = capture_answer(&page, locators, prompt, &CaptureConfig::immediate()).await;
    log_capture(&capture);
    let saved = save_document(&capture.document, output);
    Ok((capture, saved))
}

fn load_frames(paths: &[PathBuf]) -> Result<ReplayPage> {
    if paths.is_empty() {
        bail!("at least one --html file is required");
    }
    let frames = paths
        .iter()
        .map(|p| read_frame(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(ReplayPage::new(frames))
}

fn read_frame(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
