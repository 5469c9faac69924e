//! Live page surface.
//!
//! The core never talks to a browser directly. Everything it needs from the
//! page goes through these two traits, implemented over Chromium by the
//! runtime and over recorded HTML by [`crate::replay::ReplayPage`].

use crate::locators::{LocatorTable, Role};
use crate::types::ScribeResult;
use async_trait::async_trait;
use std::time::Duration;

/// State a selector wait polls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// At least one element matches.
    Attached,
    /// No element matches.
    Detached,
}

/// A handle to one element of the live page.
#[async_trait]
pub trait PageElement: Send + Sync {
    /// Rendered text of the element.
    async fn inner_text(&self) -> ScribeResult<Option<String>>;
    /// Serialized markup of the element including its own tag.
    async fn outer_html(&self) -> ScribeResult<Option<String>>;
    async fn attribute(&self, name: &str) -> ScribeResult<Option<String>>;
    async fn query_one(&self, selector: &str) -> ScribeResult<Option<Box<dyn PageElement>>>;
    async fn query_all(&self, selector: &str) -> ScribeResult<Vec<Box<dyn PageElement>>>;
    async fn click(&self) -> ScribeResult<()>;
    async fn scroll_into_view(&self) -> ScribeResult<()>;
    /// Scroll the element's own content vertically by `dy` pixels.
    async fn scroll_by(&self, dy: i64) -> ScribeResult<()>;
    /// Focus the element and type `text` into it.
    async fn type_text(&self, text: &str) -> ScribeResult<()>;
}

/// A single live page (tab).
#[async_trait]
pub trait LivePage: Send + Sync {
    async fn query_one(&self, selector: &str) -> ScribeResult<Option<Box<dyn PageElement>>>;
    async fn query_all(&self, selector: &str) -> ScribeResult<Vec<Box<dyn PageElement>>>;
    /// Run a script in the page for its side effect and return its value.
    async fn evaluate(&self, script: &str) -> ScribeResult<serde_json::Value>;
    async fn reload(&self) -> ScribeResult<()>;
    /// Wait until `selector` reaches `state`, failing with
    /// [`crate::ScribeError::Timeout`] after `timeout`.
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        timeout: Duration,
    ) -> ScribeResult<()>;
}

/// Script that scrolls the window by one screen height.
pub const SCROLL_ONE_SCREEN: &str = "window.scrollBy(0, window.innerHeight);";

/// Script that scrolls the window by `dy` pixels.
pub fn scroll_window_script(dy: i64) -> String {
    format!("window.scrollBy(0, {dy});")
}

/// First element matched by the variants of `role`, tried in declared order.
///
/// A variant whose query fails is logged and skipped; a fatal fault is
/// returned as-is.
pub async fn first_match(
    page: &dyn LivePage,
    locators: &LocatorTable,
    role: Role,
) -> ScribeResult<Option<Box<dyn PageElement>>> {
    for selector in locators.variants(role) {
        match page.query_one(selector).await {
            Ok(Some(el)) => return Ok(Some(el)),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!("{} variant `{selector}` failed: {e}", role.as_str()),
        }
    }
    Ok(None)
}

/// First element inside `scope` matched by the variants of `role`.
pub async fn first_match_in(
    scope: &dyn PageElement,
    locators: &LocatorTable,
    role: Role,
) -> ScribeResult<Option<Box<dyn PageElement>>> {
    for selector in locators.variants(role) {
        match scope.query_one(selector).await {
            Ok(Some(el)) => return Ok(Some(el)),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!("{} variant `{selector}` failed: {e}", role.as_str()),
        }
    }
    Ok(None)
}

/// Every element matched by any variant of `role`, variants concatenated in
/// declared order. Elements matched by several variants appear once per match.
pub async fn union_all(
    page: &dyn LivePage,
    locators: &LocatorTable,
    role: Role,
) -> ScribeResult<Vec<Box<dyn PageElement>>> {
    let mut all = Vec::new();
    for selector in locators.variants(role) {
        match page.query_all(selector).await {
            Ok(found) => all.extend(found),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!("{} variant `{selector}` failed: {e}", role.as_str()),
        }
    }
    Ok(all)
}

/// Trimmed inner text of an optional element; missing becomes empty.
pub async fn text_or_empty(el: Option<Box<dyn PageElement>>) -> String {
    match el {
        Some(el) => el
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}
