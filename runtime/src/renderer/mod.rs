//! Renderer abstraction for browser-based page rendering.
//!
//! A `Renderer` owns the browser engine and hands out opened pages as
//! [`LivePage`] handles (currently Chromium via chromiumoxide).

pub mod chromium;

use answer_scribe::{LivePage, ReplayPage, ScribeResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A browser engine that can open pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a page on `url`. Navigation is bounded by `timeout`; failing to
    /// reach the page is fatal.
    async fn open(&self, url: &str, timeout: Duration) -> ScribeResult<Arc<dyn LivePage>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> ScribeResult<()>;
}

/// Serves a recorded page instead of a browser.
///
/// Lets the session and run pipeline be exercised without Chromium;
/// `scribe replay` builds a `ReplayPage` directly instead.
pub struct ReplayRenderer {
    page: ReplayPage,
}

impl ReplayRenderer {
    pub fn new(page: ReplayPage) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Renderer for ReplayRenderer {
    async fn open(&self, url: &str, _timeout: Duration) -> ScribeResult<Arc<dyn LivePage>> {
        tracing::debug!("replaying recorded page in place of {url}");
        Ok(Arc::new(self.page.clone()))
    }

    async fn shutdown(&self) -> ScribeResult<()> {
        Ok(())
    }
}
