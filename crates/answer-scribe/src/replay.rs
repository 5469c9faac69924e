//! In-memory page that replays recorded HTML frames.
//!
//! Each frame is a full copy of the page markup at one point in time. Scroll
//! side effects move to the next frame, which is how virtualized lists and
//! lazy content behave on the live site. The last frame repeats forever.

use crate::extractor::element_text;
use crate::page::{LivePage, PageElement, SelectorState};
use crate::types::{ScribeError, ScribeResult};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct ReplayState {
    frames: Vec<String>,
    cursor: Mutex<usize>,
    advance_on_scroll: bool,
    advance_on_click: bool,
    reloads: AtomicUsize,
    scrolls: AtomicUsize,
    clicks: AtomicUsize,
    typed: Mutex<Vec<String>>,
}

impl ReplayState {
    fn current(&self) -> String {
        let idx = *self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        self.frames
            .get(idx)
            .or_else(|| self.frames.last())
            .cloned()
            .unwrap_or_default()
    }

    fn advance(&self) {
        let mut idx = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        if *idx + 1 < self.frames.len() {
            *idx += 1;
        }
    }

    fn on_scroll(&self) {
        self.scrolls.fetch_add(1, Ordering::Relaxed);
        if self.advance_on_scroll {
            self.advance();
        }
    }
}

/// A [`LivePage`] backed by recorded markup.
#[derive(Debug, Clone)]
pub struct ReplayPage {
    state: Arc<ReplayState>,
}

impl ReplayPage {
    /// Replay `frames` in order, advancing on every scroll.
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(frames.into_iter().map(Into::into).collect(), true, false)
    }

    /// A page that never changes.
    pub fn single(html: impl Into<String>) -> Self {
        Self::new([html.into()])
    }

    /// Advance on clicks instead of scrolls (e.g. an overlay that goes away
    /// once its close button is pressed).
    pub fn advancing_on_click<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(frames.into_iter().map(Into::into).collect(), false, true)
    }

    fn build(frames: Vec<String>, advance_on_scroll: bool, advance_on_click: bool) -> Self {
        Self {
            state: Arc::new(ReplayState {
                frames,
                cursor: Mutex::new(0),
                advance_on_scroll,
                advance_on_click,
                reloads: AtomicUsize::new(0),
                scrolls: AtomicUsize::new(0),
                clicks: AtomicUsize::new(0),
                typed: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn frame_index(&self) -> usize {
        *self.state.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn reloads(&self) -> usize {
        self.state.reloads.load(Ordering::Relaxed)
    }

    pub fn scrolls(&self) -> usize {
        self.state.scrolls.load(Ordering::Relaxed)
    }

    pub fn clicks(&self) -> usize {
        self.state.clicks.load(Ordering::Relaxed)
    }

    /// Everything typed into any element, in order.
    pub fn typed(&self) -> Vec<String> {
        self.state
            .typed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn parse_selector(selector: &str) -> ScribeResult<Selector> {
    Selector::parse(selector).map_err(|e| ScribeError::Selector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Match `selector` against `markup` and capture owned element handles.
fn select_in(
    markup: &str,
    selector: &str,
    state: &Arc<ReplayState>,
) -> ScribeResult<Vec<ReplayElement>> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_fragment(markup);
    let found = doc
        .select(&sel)
        .map(|el| ReplayElement::capture(el, Arc::clone(state)))
        .collect();
    Ok(found)
}

fn boxed(found: Vec<ReplayElement>) -> Vec<Box<dyn PageElement>> {
    found
        .into_iter()
        .map(|el| Box::new(el) as Box<dyn PageElement>)
        .collect()
}

#[async_trait]
impl LivePage for ReplayPage {
    async fn query_one(&self, selector: &str) -> ScribeResult<Option<Box<dyn PageElement>>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> ScribeResult<Vec<Box<dyn PageElement>>> {
        let markup = self.state.current();
        Ok(boxed(select_in(&markup, selector, &self.state)?))
    }

    async fn evaluate(&self, _script: &str) -> ScribeResult<serde_json::Value> {
        // The only scripts the pipeline runs are window scrolls.
        self.state.on_scroll();
        Ok(serde_json::Value::Null)
    }

    async fn reload(&self) -> ScribeResult<()> {
        self.state.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        timeout: Duration,
    ) -> ScribeResult<()> {
        let present = !select_in(&self.state.current(), selector, &self.state)?.is_empty();
        let reached = match state {
            SelectorState::Attached => present,
            SelectorState::Detached => !present,
        };
        if reached {
            Ok(())
        } else {
            Err(ScribeError::Timeout {
                what: format!("`{selector}` to be {state:?}"),
                after: timeout,
            })
        }
    }
}

/// Owned snapshot of one matched element.
#[derive(Debug, Clone)]
pub struct ReplayElement {
    outer: String,
    text: String,
    attrs: Vec<(String, String)>,
    state: Arc<ReplayState>,
}

impl ReplayElement {
    fn capture(el: ElementRef<'_>, state: Arc<ReplayState>) -> Self {
        Self {
            outer: el.html(),
            text: element_text(&el),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            state,
        }
    }
}

#[async_trait]
impl PageElement for ReplayElement {
    async fn inner_text(&self) -> ScribeResult<Option<String>> {
        Ok(Some(self.text.clone()))
    }

    async fn outer_html(&self) -> ScribeResult<Option<String>> {
        Ok(Some(self.outer.clone()))
    }

    async fn attribute(&self, name: &str) -> ScribeResult<Option<String>> {
        Ok(self
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    async fn query_one(&self, selector: &str) -> ScribeResult<Option<Box<dyn PageElement>>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> ScribeResult<Vec<Box<dyn PageElement>>> {
        let inner = select_in(&self.outer, selector, &self.state)?;
        // The element's own root would match itself; descendants only.
        Ok(boxed(
            inner
                .into_iter()
                .filter(|el| el.outer != self.outer)
                .collect(),
        ))
    }

    async fn click(&self) -> ScribeResult<()> {
        self.state.clicks.fetch_add(1, Ordering::Relaxed);
        if self.state.advance_on_click {
            self.state.advance();
        }
        Ok(())
    }

    async fn scroll_into_view(&self) -> ScribeResult<()> {
        Ok(())
    }

    async fn scroll_by(&self, _dy: i64) -> ScribeResult<()> {
        self.state.on_scroll();
        Ok(())
    }

    async fn type_text(&self, text: &str) -> ScribeResult<()> {
        self.state
            .typed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}
