//! The live session: one opened answer page, its overlay watcher and the
//! prompt submission.

use super::overlay::spawn_overlay_watcher;
use crate::config::SessionTimings;
use crate::renderer::Renderer;
use answer_scribe::page::first_match;
use answer_scribe::{LivePage, LocatorTable, PageElement, Role, ScribeError, ScribeResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Interval between lookups while waiting for an input element.
const ELEMENT_POLL: Duration = Duration::from_millis(250);

/// An opened page plus the background task watching it.
pub struct Session {
    page: Arc<dyn LivePage>,
    watcher: Option<JoinHandle<()>>,
}

impl Session {
    /// Navigate to `url` and wait out the settle period.
    pub async fn open(
        renderer: &dyn Renderer,
        url: &str,
        timings: &SessionTimings,
    ) -> ScribeResult<Self> {
        info!("navigating to {url}");
        let page = renderer.open(url, timings.navigation_timeout).await?;
        tokio::time::sleep(timings.settle).await;
        info!("page loaded");
        Ok(Self {
            page,
            watcher: None,
        })
    }

    pub fn page(&self) -> &dyn LivePage {
        self.page.as_ref()
    }

    /// Start dismissing the login overlay in the background. Calling this
    /// again replaces the previous watcher.
    pub fn watch_overlay(&mut self, locators: Arc<LocatorTable>, timings: &SessionTimings) {
        if let Some(old) = self.watcher.take() {
            old.abort();
        }
        self.watcher = Some(spawn_overlay_watcher(
            Arc::clone(&self.page),
            locators,
            timings.overlay_poll,
            timings.overlay_detach_timeout,
        ));
    }

    /// Type the prompt and press submit. Any failure here is fatal.
    pub async fn submit_prompt(
        &self,
        locators: &LocatorTable,
        prompt: &str,
        timings: &SessionTimings,
    ) -> ScribeResult<()> {
        info!("waiting for prompt input");
        let input = wait_for_role(self.page(), locators, Role::PromptInput, timings.input_timeout)
            .await?;
        input
            .type_text(prompt)
            .await
            .map_err(|e| submission_fault("typing the prompt", e))?;
        info!("prompt entered: {prompt:?}");

        let submit = wait_for_role(self.page(), locators, Role::SubmitButton, timings.input_timeout)
            .await?;
        submit
            .scroll_into_view()
            .await
            .map_err(|e| submission_fault("scrolling to submit", e))?;
        submit
            .click()
            .await
            .map_err(|e| submission_fault("clicking submit", e))?;
        info!("query submitted");
        Ok(())
    }

    /// Stop the watcher and shut the browser down. Best effort.
    pub async fn close(mut self, renderer: &dyn Renderer) {
        if let Some(watcher) = self.watcher.take() {
            if !watcher.is_finished() {
                debug!("cancelling overlay watcher");
            }
            watcher.abort();
        }
        info!("closing browser");
        if let Err(e) = renderer.shutdown().await {
            warn!("failed to close browser: {e}");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Poll until `role` matches or `timeout` elapses.
async fn wait_for_role(
    page: &dyn LivePage,
    locators: &LocatorTable,
    role: Role,
    timeout: Duration,
) -> ScribeResult<Box<dyn PageElement>> {
    let wait = async {
        loop {
            if let Some(el) = first_match(page, locators, role).await? {
                return Ok(el);
            }
            tokio::time::sleep(ELEMENT_POLL).await;
        }
    };
    match tokio::time::timeout(timeout, wait).await {
        Ok(Ok(el)) => Ok(el),
        Ok(Err(e)) => Err(submission_fault(role.as_str(), e)),
        Err(_) => Err(ScribeError::Submission(format!(
            "{} not found within {timeout:?}",
            role.as_str()
        ))),
    }
}

/// Anything that goes wrong while submitting becomes an interaction fault,
/// except a lost session which keeps its own class.
fn submission_fault(step: &str, e: ScribeError) -> ScribeError {
    match e {
        ScribeError::SessionClosed(_) => e,
        other => ScribeError::Submission(format!("{step}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::ReplayRenderer;
    use answer_scribe::ReplayPage;

    fn locators() -> LocatorTable {
        let mut t = LocatorTable::empty();
        t.set(Role::PromptInput, ["textarea"]);
        t.set(Role::SubmitButton, ["button.send"]);
        t.set(Role::Modal, ["div.modal"]);
        t.set(Role::ModalClose, ["div.close"]);
        t
    }

    fn timings() -> SessionTimings {
        SessionTimings {
            settle: Duration::ZERO,
            input_timeout: Duration::from_millis(50),
            overlay_poll: Duration::from_millis(1),
            overlay_detach_timeout: Duration::ZERO,
            linger: Duration::ZERO,
            ..SessionTimings::default()
        }
    }

    #[tokio::test]
    async fn test_submit_types_and_clicks() {
        let page = ReplayPage::single(r#"<textarea></textarea><button class="send">Go</button>"#);
        let renderer = ReplayRenderer::new(page.clone());
        let session = Session::open(&renderer, "https://example.test", &timings())
            .await
            .unwrap();

        session
            .submit_prompt(&locators(), "what is rust?", &timings())
            .await
            .unwrap();
        assert_eq!(page.typed(), ["what is rust?"]);
        assert_eq!(page.clicks(), 1);
        session.close(&renderer).await;
    }

    #[tokio::test]
    async fn test_missing_input_is_fatal() {
        let page = ReplayPage::single("<p>maintenance</p>");
        let renderer = ReplayRenderer::new(page.clone());
        let session = Session::open(&renderer, "https://example.test", &timings())
            .await
            .unwrap();

        let err = session
            .submit_prompt(&locators(), "q", &timings())
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::Submission(_)));
        assert!(err.is_fatal());
        assert!(page.typed().is_empty());
    }

    #[tokio::test]
    async fn test_missing_submit_button_is_fatal() {
        let page = ReplayPage::single("<textarea></textarea>");
        let renderer = ReplayRenderer::new(page.clone());
        let session = Session::open(&renderer, "https://example.test", &timings())
            .await
            .unwrap();

        let err = session
            .submit_prompt(&locators(), "q", &timings())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(page.typed(), ["q"]);
        assert_eq!(page.clicks(), 0);
    }

    #[tokio::test]
    async fn test_close_cancels_running_watcher() {
        let page = ReplayPage::single("<textarea></textarea>");
        let renderer = ReplayRenderer::new(page);
        let mut session = Session::open(&renderer, "https://example.test", &timings())
            .await
            .unwrap();
        session.watch_overlay(Arc::new(locators()), &timings());
        // No modal ever shows, so the watcher would poll forever.
        session.close(&renderer).await;
    }
}
