//! Stabilization poller: decide when a streamed answer has finished rendering.
//!
//! The page gives no completion signal, so the poller samples the combined
//! content markup once per tick and treats an unchanged length for
//! `stable_threshold` consecutive ticks as "done". It then reloads the page
//! once so lazily hydrated content renders completely, and stops.
//!
//! Length is only a proxy: an edit that keeps the total length unchanged
//! (e.g. a character substitution) reads as a stable tick. This is a known
//! limitation of the sampling signal.

use crate::locators::{LocatorTable, Role};
use crate::page::{LivePage, SelectorState, SCROLL_ONE_SCREEN};
use crate::snapshot::collect_snapshot;
use crate::types::Snapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timing and threshold knobs for the poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// Quiet period before the first tick.
    pub initial_delay: Duration,
    /// Real time slept between ticks.
    pub tick_interval: Duration,
    /// Hard ceiling, in ticks.
    pub ceiling_ticks: u64,
    /// Scroll one screen on every tick divisible by this. 0 disables.
    pub scroll_every_ticks: u64,
    /// Pause after a scroll so new content can render.
    pub scroll_pause: Duration,
    /// Consecutive equal-length ticks that count as stable.
    pub stable_threshold: u32,
    /// Reload the page once after stabilizing.
    pub reload_once: bool,
    pub pre_reload_delay: Duration,
    pub post_reload_delay: Duration,
    /// Bound on waiting for the loading indicator to go away after a reload.
    pub loading_timeout: Duration,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(20),
            tick_interval: Duration::from_secs(1),
            ceiling_ticks: 600,
            scroll_every_ticks: 10,
            scroll_pause: Duration::from_secs(1),
            stable_threshold: 10,
            reload_once: true,
            pre_reload_delay: Duration::from_secs(10),
            post_reload_delay: Duration::from_secs(10),
            loading_timeout: Duration::from_secs(10),
        }
    }
}

impl StabilizerConfig {
    /// Same thresholds with every delay set to zero, for replayed pages.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            tick_interval: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            pre_reload_delay: Duration::ZERO,
            post_reload_delay: Duration::ZERO,
            loading_timeout: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Where the poller is in its settle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// The last sample changed length.
    Growing,
    /// Equal-length samples are accumulating but below the threshold.
    Settling,
    /// Threshold reached; about to reload or finish.
    Stable,
    /// The one-time reload is in progress.
    Reloading,
    Done(Termination),
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Content settled (and was reloaded once, if enabled).
    Stabilized,
    /// The tick ceiling was hit first; the snapshot is best effort.
    CeilingReached,
    /// The page stopped answering; the snapshot is the last good sample.
    Aborted,
}

/// What the loop should do after a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    Reload,
    Finish(Termination),
}

/// Mutable poller state. Owned by one loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizationState {
    pub elapsed_ticks: u64,
    pub last_snapshot_length: usize,
    pub consecutive_stable_ticks: u32,
    pub has_reloaded: bool,
    pub phase: Phase,
}

/// The settle state machine, independent of any page.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    stable_threshold: u32,
    ceiling_ticks: u64,
    scroll_every_ticks: u64,
    reload_once: bool,
    state: StabilizationState,
}

impl Stabilizer {
    pub fn new(config: &StabilizerConfig) -> Self {
        Self {
            stable_threshold: config.stable_threshold.max(1),
            ceiling_ticks: config.ceiling_ticks,
            scroll_every_ticks: config.scroll_every_ticks,
            reload_once: config.reload_once,
            state: StabilizationState {
                elapsed_ticks: 0,
                last_snapshot_length: 0,
                consecutive_stable_ticks: 0,
                has_reloaded: false,
                phase: Phase::Growing,
            },
        }
    }

    pub fn state(&self) -> &StabilizationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn ceiling_reached(&self) -> bool {
        self.state.elapsed_ticks >= self.ceiling_ticks
    }

    /// Whether this tick should fire the incremental-load scroll.
    pub fn should_scroll(&self) -> bool {
        self.scroll_every_ticks > 0 && self.state.elapsed_ticks % self.scroll_every_ticks == 0
    }

    /// Feed one sample. `None` is a failed sample: it counts as a non-stable
    /// tick and leaves the remembered length untouched.
    pub fn observe(&mut self, sample: Option<usize>) -> Directive {
        match self.state.phase {
            Phase::Done(t) => return Directive::Finish(t),
            Phase::Reloading => return Directive::Continue,
            _ => {}
        }

        match sample {
            Some(len) if len == self.state.last_snapshot_length => {
                self.state.consecutive_stable_ticks += 1;
            }
            Some(len) => {
                self.state.consecutive_stable_ticks = 0;
                self.state.last_snapshot_length = len;
            }
            None => self.state.consecutive_stable_ticks = 0,
        }

        if self.state.consecutive_stable_ticks < self.stable_threshold {
            self.state.phase = if self.state.consecutive_stable_ticks == 0 {
                Phase::Growing
            } else {
                Phase::Settling
            };
            return Directive::Continue;
        }

        self.state.phase = Phase::Stable;
        if self.reload_once && !self.state.has_reloaded {
            self.state.phase = Phase::Reloading;
            Directive::Reload
        } else {
            Directive::Finish(self.finish(Termination::Stabilized))
        }
    }

    /// The reload cycle finished (successfully or not). Ends the loop.
    pub fn reload_done(&mut self) -> Termination {
        self.state.has_reloaded = true;
        self.finish(Termination::Stabilized)
    }

    /// Move to the next tick.
    pub fn advance(&mut self) {
        self.state.elapsed_ticks += 1;
    }

    pub fn finish(&mut self, termination: Termination) -> Termination {
        self.state.phase = Phase::Done(termination);
        termination
    }
}

/// Outcome of [`wait_for_stable_content`].
#[derive(Debug, Clone)]
pub struct StabilizationReport {
    /// Fresh snapshot taken after the loop, or the last good sample if that
    /// final collection failed.
    pub snapshot: Snapshot,
    pub termination: Termination,
    pub elapsed_ticks: u64,
    pub reloaded: bool,
}

/// Poll the page until its content settles, the ceiling is hit, or the page
/// stops answering. Never fails: every fault short of a closed session is
/// logged and counted as an unproductive tick.
pub async fn wait_for_stable_content(
    page: &dyn LivePage,
    locators: &LocatorTable,
    config: &StabilizerConfig,
) -> StabilizationReport {
    info!(
        "waiting {:?} before polling for content",
        config.initial_delay
    );
    tokio::time::sleep(config.initial_delay).await;

    let mut stabilizer = Stabilizer::new(config);
    let mut best = Snapshot::default();

    let termination = loop {
        if stabilizer.ceiling_reached() {
            warn!(
                "content did not settle within {} ticks, using best effort snapshot",
                config.ceiling_ticks
            );
            break stabilizer.finish(Termination::CeilingReached);
        }
        let tick = stabilizer.state().elapsed_ticks;

        if stabilizer.should_scroll() {
            match page.evaluate(SCROLL_ONE_SCREEN).await {
                Ok(_) => debug!("tick {tick}: scrolled one screen"),
                Err(e) if e.is_fatal() => {
                    error!("tick {tick}: page lost while scrolling: {e}");
                    break stabilizer.finish(Termination::Aborted);
                }
                Err(e) => warn!("tick {tick}: scroll failed: {e}"),
            }
            tokio::time::sleep(config.scroll_pause).await;
        }

        let sample = match collect_snapshot(page, locators).await {
            Ok(snapshot) => {
                let len = snapshot.len();
                best = snapshot;
                Some(len)
            }
            Err(e) if e.is_fatal() => {
                error!("tick {tick}: page lost while sampling: {e}");
                break stabilizer.finish(Termination::Aborted);
            }
            Err(e) => {
                warn!("tick {tick}: snapshot failed: {e}");
                None
            }
        };

        match stabilizer.observe(sample) {
            Directive::Continue => {
                let s = stabilizer.state();
                debug!(
                    "tick {tick}: {} bytes, stable for {} tick(s)",
                    s.last_snapshot_length, s.consecutive_stable_ticks
                );
            }
            Directive::Reload => {
                info!(
                    "content stable for {} ticks, reloading once",
                    stabilizer.state().consecutive_stable_ticks
                );
                reload_cycle(page, locators, config).await;
                break stabilizer.reload_done();
            }
            Directive::Finish(t) => {
                info!("content stable, finishing without reload");
                break t;
            }
        }

        tokio::time::sleep(config.tick_interval).await;
        stabilizer.advance();
    };

    // A reload invalidates earlier handles, so sample once more.
    let snapshot = if termination == Termination::Aborted {
        best
    } else {
        match collect_snapshot(page, locators).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("final snapshot failed, keeping last good sample: {e}");
                best
            }
        }
    };

    let state = stabilizer.state();
    info!(
        "stabilization finished: {termination:?} after {} tick(s), {} bytes",
        state.elapsed_ticks,
        snapshot.len()
    );
    StabilizationReport {
        snapshot,
        termination,
        elapsed_ticks: state.elapsed_ticks,
        reloaded: state.has_reloaded,
    }
}

async fn reload_cycle(page: &dyn LivePage, locators: &LocatorTable, config: &StabilizerConfig) {
    tokio::time::sleep(config.pre_reload_delay).await;
    match page.reload().await {
        Ok(()) => info!("page reloaded"),
        Err(e) => warn!("reload failed: {e}"),
    }
    for selector in locators.variants(Role::LoadingIndicator) {
        if let Err(e) = page
            .wait_for_selector(selector, SelectorState::Detached, config.loading_timeout)
            .await
        {
            warn!("loading indicator `{selector}` still present: {e}");
        }
    }
    tokio::time::sleep(config.post_reload_delay).await;
}
