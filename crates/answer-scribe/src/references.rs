//! Reference resolver: scroll the virtualized reference list and read the
//! rows for exactly the cited numbers.
//!
//! Only a window of rows is rendered at a time, so the resolver scans what is
//! visible, scrolls, and scans again. It stops as soon as every cited number
//! is resolved, after `max_consecutive_no_new` unproductive passes, or at the
//! attempt ceiling, whichever comes first.

use crate::locators::{LocatorTable, Role};
use crate::page::{
    first_match, first_match_in, scroll_window_script, text_or_empty, LivePage, PageElement,
};
use crate::types::{Bibliography, CitationSet, ReferenceEntry, ScribeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Scroll attempts allowed per unit of the highest cited number.
    pub attempts_per_citation: u32,
    /// Attempt ceiling used when nothing is cited.
    pub fallback_attempts: u32,
    /// Passes without a new entry before giving up on the rest.
    pub max_consecutive_no_new: u32,
    /// Pixels scrolled per attempt.
    pub scroll_step: i64,
    pub scroll_pause: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            attempts_per_citation: 3,
            fallback_attempts: 20,
            max_consecutive_no_new: 10,
            scroll_step: 400,
            scroll_pause: Duration::from_millis(700),
        }
    }
}

impl ResolverConfig {
    /// Same limits with no pause between scrolls.
    pub fn immediate() -> Self {
        Self {
            scroll_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Upper bound on scroll attempts for a citation set.
    pub fn max_attempts(&self, citations: &CitationSet) -> u32 {
        match citations.max() {
            Some(max) => max.saturating_mul(self.attempts_per_citation),
            None => self.fallback_attempts,
        }
    }
}

/// Why resolution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveStop {
    /// Every cited number was resolved.
    Complete,
    /// Too many passes in a row found nothing new.
    NoProgress,
    /// The attempt ceiling was reached.
    AttemptsExhausted,
    /// The page stopped answering.
    Aborted,
}

/// Pure bookkeeping for the scroll-and-scan loop.
#[derive(Debug, Clone)]
pub struct ResolutionProgress {
    max_attempts: u32,
    max_consecutive_no_new: u32,
    attempts: u32,
    consecutive_no_new: u32,
    resolved: usize,
}

impl ResolutionProgress {
    pub fn new(config: &ResolverConfig, citations: &CitationSet) -> Self {
        Self {
            max_attempts: config.max_attempts(citations),
            max_consecutive_no_new: config.max_consecutive_no_new,
            attempts: 0,
            consecutive_no_new: 0,
            resolved: 0,
        }
    }

    /// Whether another pass may start.
    pub fn may_continue(&self) -> Option<ResolveStop> {
        if self.attempts >= self.max_attempts {
            Some(ResolveStop::AttemptsExhausted)
        } else if self.consecutive_no_new >= self.max_consecutive_no_new {
            Some(ResolveStop::NoProgress)
        } else {
            None
        }
    }

    /// Record the resolved count after a pass. The count never decreases.
    pub fn record_pass(&mut self, resolved_now: usize) {
        if resolved_now > self.resolved {
            self.consecutive_no_new = 0;
            self.resolved = resolved_now;
        } else {
            self.consecutive_no_new += 1;
        }
    }

    /// Count one scroll attempt.
    pub fn record_scroll(&mut self) {
        self.attempts += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn resolved(&self) -> usize {
        self.resolved
    }
}

/// Result of [`resolve_references`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub bibliography: Bibliography,
    pub stop: ResolveStop,
    pub attempts: u32,
}

/// Strip whitespace and surrounding punctuation from an index label and
/// parse it: `"12."` and `"[12]"` both give `12`.
pub fn normalize_index(label: &str) -> Option<u32> {
    let trimmed = label.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Resolve as many cited numbers as the reference list yields.
///
/// Unresolved numbers are simply absent from the bibliography.
pub async fn resolve_references(
    page: &dyn LivePage,
    locators: &LocatorTable,
    citations: &CitationSet,
    config: &ResolverConfig,
) -> Resolution {
    let mut bibliography = Bibliography::new();
    let mut progress = ResolutionProgress::new(config, citations);

    if citations.is_empty() {
        info!("no citations in content, skipping reference list");
        return Resolution {
            bibliography,
            stop: ResolveStop::Complete,
            attempts: 0,
        };
    }

    let scroller = match first_match(page, locators, Role::ReferenceScroller).await {
        Ok(found) => found,
        Err(e) => {
            warn!("reference scroller lookup failed: {e}");
            None
        }
    };
    if scroller.is_none() {
        debug!("no reference scroll container, scrolling the window");
    }

    let stop = loop {
        if let Some(stop) = progress.may_continue() {
            break stop;
        }

        if let Err(e) = scan_visible_rows(page, locators, citations, &mut bibliography).await {
            warn!("reference list unavailable: {e}");
            break ResolveStop::Aborted;
        }
        progress.record_pass(bibliography.len());

        if bibliography.covers(citations) {
            info!("all {} cited references extracted", citations.len());
            break ResolveStop::Complete;
        }

        let scrolled = match &scroller {
            Some(el) => el.scroll_by(config.scroll_step).await,
            None => page
                .evaluate(&scroll_window_script(config.scroll_step))
                .await
                .map(|_| ()),
        };
        if let Err(e) = scrolled {
            if e.is_fatal() {
                warn!("reference list unavailable: {e}");
                break ResolveStop::Aborted;
            }
            warn!("reference scroll failed: {e}");
        }
        tokio::time::sleep(config.scroll_pause).await;
        progress.record_scroll();
    };

    info!(
        "resolved {}/{} cited references ({stop:?} after {} scroll(s))",
        bibliography.len(),
        citations.len(),
        progress.attempts()
    );
    Resolution {
        bibliography,
        stop,
        attempts: progress.attempts(),
    }
}

/// One pass over every rendered row of every reference-block variant.
/// Only a fatal fault is returned; row-level faults are skipped.
async fn scan_visible_rows(
    page: &dyn LivePage,
    locators: &LocatorTable,
    citations: &CitationSet,
    bibliography: &mut Bibliography,
) -> ScribeResult<()> {
    for selector in locators.variants(Role::ReferenceBlock) {
        let rows = match page.query_all(selector).await {
            Ok(rows) => rows,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("reference block variant `{selector}` failed: {e}");
                continue;
            }
        };
        for row in rows {
            match read_row(row.as_ref(), locators, citations, bibliography).await {
                Ok(Some(entry)) => {
                    debug!("extracted reference [{}]: {}", entry.number, entry.citation());
                    bibliography.insert(entry);
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("skipping unreadable reference row: {e}"),
            }
        }
    }
    Ok(())
}

/// Read one row if it is cited and not yet resolved.
async fn read_row(
    row: &dyn PageElement,
    locators: &LocatorTable,
    citations: &CitationSet,
    bibliography: &Bibliography,
) -> ScribeResult<Option<ReferenceEntry>> {
    let label = text_or_empty(first_match_in(row, locators, Role::ReferenceIndex).await?).await;
    let Some(number) = normalize_index(&label) else {
        return Ok(None);
    };
    let key = number.to_string();
    if !citations.contains(number) || bibliography.contains(&key) {
        return Ok(None);
    }

    let title = text_or_empty(first_match_in(row, locators, Role::ReferenceTitle).await?).await;
    let date = text_or_empty(first_match_in(row, locators, Role::ReferenceDate).await?).await;
    let journal = text_or_empty(first_match_in(row, locators, Role::ReferenceJournal).await?).await;

    let mut authors = Vec::new();
    for selector in locators.variants(Role::ReferenceAuthor) {
        for el in row.query_all(selector).await? {
            let name = text_or_empty(Some(el)).await;
            if !name.is_empty() {
                authors.push(name);
            }
        }
        if !authors.is_empty() {
            break;
        }
    }

    Ok(Some(ReferenceEntry {
        number: key,
        authors,
        date,
        title,
        journal,
    }))
}
