//! Chromium-based renderer using chromiumoxide.

use super::Renderer;
use answer_scribe::{LivePage, PageElement, ScribeError, ScribeResult, SelectorState};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Interval between checks while waiting for a selector state.
const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Explicit path (SCRIBE_CHROMIUM_PATH)
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!("configured Chromium path {} does not exist", path.display());
    }

    // 2. ~/.scribe/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".scribe/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".scribe/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".scribe/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".scribe/chromium/chrome-linux64/chrome"),
                home.join(".scribe/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A lost connection means the session is gone; anything else is a page fault.
fn map_cdp(context: &str, e: CdpError) -> ScribeError {
    match e {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) => {
            ScribeError::SessionClosed(format!("{context}: {e}"))
        }
        other => ScribeError::Page(format!("{context}: {other}")),
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch Chromium, headless (`--headless=new`) or with a visible window.
    pub async fn launch(chromium: Option<&Path>, headless: bool) -> ScribeResult<Self> {
        let chrome_path = find_chromium(chromium).ok_or_else(|| {
            ScribeError::Launch(
                "Chromium not found. Set SCRIBE_CHROMIUM_PATH or install Chrome.".into(),
            )
        })?;
        tracing::info!(
            "launching {} ({})",
            chrome_path.display(),
            if headless { "headless" } else { "headed" }
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| ScribeError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScribeError::Launch(format!("failed to launch Chromium: {e}")))?;

        // Drive the CDP connection.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open(&self, url: &str, timeout: Duration) -> ScribeResult<Arc<dyn LivePage>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| ScribeError::Launch(format!("failed to create page: {e}")))?;

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {
                let _ = page.wait_for_navigation().await;
            }
            Ok(Err(e)) => return Err(ScribeError::Navigation(format!("{url}: {e}"))),
            Err(_) => {
                return Err(ScribeError::Navigation(format!(
                    "{url}: timed out after {timeout:?}"
                )))
            }
        }
        tracing::info!("navigated to {url}");
        Ok(Arc::new(ChromiumPage { page }))
    }

    async fn shutdown(&self) -> ScribeResult<()> {
        let result = self.browser.lock().await.close().await;
        self.handler.abort();
        result
            .map(|_| ())
            .map_err(|e| ScribeError::SessionClosed(format!("browser close failed: {e}")))
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
}

fn boxed(elements: Vec<Element>) -> Vec<Box<dyn PageElement>> {
    elements
        .into_iter()
        .map(|el| Box::new(ChromiumElement { el }) as Box<dyn PageElement>)
        .collect()
}

#[async_trait]
impl LivePage for ChromiumPage {
    async fn query_one(&self, selector: &str) -> ScribeResult<Option<Box<dyn PageElement>>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> ScribeResult<Vec<Box<dyn PageElement>>> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| map_cdp(selector, e))?;
        Ok(boxed(found))
    }

    async fn evaluate(&self, script: &str) -> ScribeResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| map_cdp("evaluate", e))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn reload(&self) -> ScribeResult<()> {
        self.page
            .reload()
            .await
            .map_err(|e| map_cdp("reload", e))?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        timeout: Duration,
    ) -> ScribeResult<()> {
        let wait = async {
            loop {
                let present = !self
                    .page
                    .find_elements(selector)
                    .await
                    .map_err(|e| map_cdp(selector, e))?
                    .is_empty();
                if present == (state == SelectorState::Attached) {
                    return Ok(());
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ScribeError::Timeout {
                what: format!("`{selector}` to be {state:?}"),
                after: timeout,
            }),
        }
    }
}

/// One element handle inside a [`ChromiumPage`].
pub struct ChromiumElement {
    el: Element,
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn inner_text(&self) -> ScribeResult<Option<String>> {
        self.el
            .inner_text()
            .await
            .map_err(|e| map_cdp("inner text", e))
    }

    async fn outer_html(&self) -> ScribeResult<Option<String>> {
        self.el
            .outer_html()
            .await
            .map_err(|e| map_cdp("outer html", e))
    }

    async fn attribute(&self, name: &str) -> ScribeResult<Option<String>> {
        self.el
            .attribute(name)
            .await
            .map_err(|e| map_cdp(name, e))
    }

    async fn query_one(&self, selector: &str) -> ScribeResult<Option<Box<dyn PageElement>>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> ScribeResult<Vec<Box<dyn PageElement>>> {
        let found = self
            .el
            .find_elements(selector)
            .await
            .map_err(|e| map_cdp(selector, e))?;
        Ok(boxed(found))
    }

    async fn click(&self) -> ScribeResult<()> {
        self.el.click().await.map_err(|e| map_cdp("click", e))?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> ScribeResult<()> {
        self.el
            .scroll_into_view()
            .await
            .map_err(|e| map_cdp("scroll into view", e))?;
        Ok(())
    }

    async fn scroll_by(&self, dy: i64) -> ScribeResult<()> {
        self.el
            .call_js_fn(format!("function() {{ this.scrollBy(0, {dy}); }}"), false)
            .await
            .map_err(|e| map_cdp("scroll", e))?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> ScribeResult<()> {
        self.el
            .call_js_fn("function() { this.focus(); if ('value' in this) this.value = ''; }", false)
            .await
            .map_err(|e| map_cdp("clear input", e))?;
        self.el
            .type_str(text)
            .await
            .map_err(|e| map_cdp("type", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_path_falls_through() {
        let bogus = Path::new("/definitely/not/a/chrome");
        // Whatever discovery finds, it is never the bogus path.
        assert_ne!(find_chromium(Some(bogus)).as_deref(), Some(bogus));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_open_query_and_scroll() {
        let renderer = ChromiumRenderer::launch(None, true)
            .await
            .expect("failed to launch renderer");
        let page = renderer
            .open(
                "data:text/html,<div class='a' style='height:50px;overflow:auto'><p>Hello</p><p>World</p></div>",
                Duration::from_secs(10),
            )
            .await
            .expect("navigation failed");

        let paragraphs = page.query_all("div.a p").await.expect("query failed");
        assert_eq!(paragraphs.len(), 2);
        let text = paragraphs[0].inner_text().await.expect("text failed");
        assert_eq!(text.as_deref(), Some("Hello"));

        let block = page.query_one("div.a").await.unwrap().expect("block missing");
        block.scroll_by(20).await.expect("scroll failed");
        let top = page
            .evaluate("document.querySelector('div.a').scrollTop")
            .await
            .expect("evaluate failed");
        assert!(top.as_f64().unwrap_or(0.0) > 0.0);

        page.wait_for_selector("div.missing", SelectorState::Detached, Duration::from_secs(1))
            .await
            .expect("absent selector should count as detached");

        renderer.shutdown().await.expect("shutdown failed");
    }
}
