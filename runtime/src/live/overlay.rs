//! Login-overlay watcher.
//!
//! Runs beside the main flow, looks for the interstitial login modal and
//! closes it. Nothing waits on its result; the session aborts it at teardown.

use answer_scribe::page::{first_match, first_match_in};
use answer_scribe::{LivePage, LocatorTable, Role, ScribeResult, SelectorState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Close the modal if it is showing.
///
/// Returns `Ok(true)` once the modal has been clicked away and detached,
/// `Ok(false)` if there was nothing to close (or it did not go away).
pub async fn dismiss_overlay(
    page: &dyn LivePage,
    locators: &LocatorTable,
    detach_timeout: Duration,
) -> ScribeResult<bool> {
    let Some(modal) = first_match(page, locators, Role::Modal).await? else {
        return Ok(false);
    };
    info!("login popup detected");
    let Some(close) = first_match_in(modal.as_ref(), locators, Role::ModalClose).await? else {
        debug!("login popup has no close button yet");
        return Ok(false);
    };
    close.click().await?;

    for selector in locators.variants(Role::Modal) {
        if let Err(e) = page
            .wait_for_selector(selector, SelectorState::Detached, detach_timeout)
            .await
        {
            warn!("login popup still present: {e}");
            return Ok(false);
        }
    }
    info!("login popup closed");
    Ok(true)
}

/// Spawn the watcher. It polls every `poll` until the overlay has been
/// dismissed once or the page goes away.
pub fn spawn_overlay_watcher(
    page: Arc<dyn LivePage>,
    locators: Arc<LocatorTable>,
    poll: Duration,
    detach_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match dismiss_overlay(page.as_ref(), &locators, detach_timeout).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) if e.is_fatal() => {
                    debug!("overlay watcher stopping: {e}");
                    return;
                }
                Err(e) => warn!("could not close login popup: {e}"),
            }
            tokio::time::sleep(poll).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use answer_scribe::ReplayPage;

    const WITH_MODAL: &str = r#"<div class="modal"><div class="close">x</div></div><textarea></textarea>"#;
    const WITHOUT_MODAL: &str = "<textarea></textarea>";

    fn locators() -> LocatorTable {
        let mut t = LocatorTable::empty();
        t.set(Role::Modal, ["div.modal"]);
        t.set(Role::ModalClose, ["div.close"]);
        t
    }

    #[tokio::test]
    async fn test_dismiss_clicks_close_button() {
        let page = ReplayPage::advancing_on_click([WITH_MODAL, WITHOUT_MODAL]);
        let closed = dismiss_overlay(&page, &locators(), Duration::ZERO)
            .await
            .unwrap();
        assert!(closed);
        assert_eq!(page.clicks(), 1);
    }

    #[tokio::test]
    async fn test_no_modal_is_a_no_op() {
        let page = ReplayPage::single(WITHOUT_MODAL);
        assert!(!dismiss_overlay(&page, &locators(), Duration::ZERO)
            .await
            .unwrap());
        assert_eq!(page.clicks(), 0);
    }

    #[tokio::test]
    async fn test_stuck_modal_is_not_reported_closed() {
        let page = ReplayPage::single(WITH_MODAL);
        assert!(!dismiss_overlay(&page, &locators(), Duration::ZERO)
            .await
            .unwrap());
        assert_eq!(page.clicks(), 1);
    }

    #[tokio::test]
    async fn test_watcher_finishes_after_dismissal() {
        let page = ReplayPage::advancing_on_click([WITH_MODAL, WITHOUT_MODAL]);
        let handle = spawn_overlay_watcher(
            Arc::new(page.clone()),
            Arc::new(locators()),
            Duration::from_millis(1),
            Duration::ZERO,
        );
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher should stop on its own")
            .unwrap();
        assert_eq!(page.clicks(), 1);
    }

    #[tokio::test]
    async fn test_watcher_can_be_aborted() {
        let page = ReplayPage::single(WITHOUT_MODAL);
        let handle = spawn_overlay_watcher(
            Arc::new(page),
            Arc::new(locators()),
            Duration::from_millis(1),
            Duration::ZERO,
        );
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
