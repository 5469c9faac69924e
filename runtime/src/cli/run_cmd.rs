//! `scribe <PROMPT>`: one live session against the answer site.

use crate::cli::output::{log_capture, save_document, OutputOptions};
use crate::config::RunConfig;
use crate::live::Session;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use answer_scribe::{capture_answer, Capture, LocatorTable};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What a finished session produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub capture: Capture,
    /// `None` when saving failed.
    pub saved: Option<PathBuf>,
}

/// Launch Chromium and run one session.
pub async fn run(
    prompt: &str,
    headless: bool,
    locators: LocatorTable,
    config: &RunConfig,
    output: &OutputOptions,
) -> Result<RunOutcome> {
    info!("launching browser");
    let renderer = ChromiumRenderer::launch(config.chromium_path.as_deref(), headless)
        .await
        .context("failed to launch browser")?;
    run_session(&renderer, prompt, locators, config, output).await
}

/// navigate → settle → watch overlay → submit → capture → save → linger →
/// close. The browser is shut down on every path.
pub async fn run_session(
    renderer: &dyn Renderer,
    prompt: &str,
    locators: LocatorTable,
    config: &RunConfig,
    output: &OutputOptions,
) -> Result<RunOutcome> {
    let timings = &config.timings;
    let mut session = match Session::open(renderer, &config.site_url, timings).await {
        Ok(session) => session,
        Err(e) => {
            if let Err(shutdown) = renderer.shutdown().await {
                warn!("failed to close browser: {shutdown}");
            }
            return Err(e).context("failed to open the answer page");
        }
    };

    let locators = Arc::new(locators);
    session.watch_overlay(Arc::clone(&locators), timings);

    let result = drive(&session, &locators, prompt, config, output).await;
    session.close(renderer).await;
    result
}

async fn drive(
    session: &Session,
    locators: &LocatorTable,
    prompt: &str,
    config: &RunConfig,
    output: &OutputOptions,
) -> Result<RunOutcome> {
    session
        .submit_prompt(locators, prompt, &config.timings)
        .await
        .context("failed to submit the prompt")?;

    let capture = capture_answer(session.page(), locators, prompt, &config.capture).await;
    log_capture(&capture);
    let saved = save_document(&capture.document, output);

    tokio::time::sleep(config.timings.linger).await;
    Ok(RunOutcome { capture, saved })
}
