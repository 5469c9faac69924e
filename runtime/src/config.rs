//! Run configuration.
//!
//! Built-in defaults, overridden by `SCRIBE_*` environment variables and then
//! by command-line flags.

use answer_scribe::{CaptureConfig, ResolverConfig, StabilizerConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SITE_URL: &str = "https://www.bohrium.com/en-US";

const DEFAULT_NAV_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_SETTLE_MS: u64 = 6_000;

/// Waits and delays of the live session outside the capture loops.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTimings {
    /// Bound on the initial navigation.
    pub navigation_timeout: Duration,
    /// Quiet period after navigation before anything is touched.
    pub settle: Duration,
    /// Bound on waiting for the prompt input and the submit button.
    pub input_timeout: Duration,
    /// How often the overlay watcher looks for the login modal.
    pub overlay_poll: Duration,
    /// Bound on waiting for a dismissed modal to go away.
    pub overlay_detach_timeout: Duration,
    /// Pause before closing the browser.
    pub linger: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            input_timeout: Duration::from_secs(15),
            overlay_poll: Duration::from_millis(500),
            overlay_detach_timeout: Duration::from_secs(7),
            linger: Duration::from_secs(3),
        }
    }
}

/// Everything one run needs besides the prompt and the locator table.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub site_url: String,
    /// Explicit browser binary; discovery is used when unset.
    pub chromium_path: Option<PathBuf>,
    pub timings: SessionTimings,
    pub capture: CaptureConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            chromium_path: None,
            timings: SessionTimings::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl RunConfig {
    /// Defaults with every `SCRIBE_*` override applied.
    pub fn from_env() -> Self {
        let stabilizer = StabilizerConfig::default();
        let resolver = ResolverConfig::default();
        let timings = SessionTimings::default();

        Self {
            site_url: read_env_string("SCRIBE_SITE_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            chromium_path: read_env_string("SCRIBE_CHROMIUM_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            timings: SessionTimings {
                navigation_timeout: Duration::from_millis(
                    read_env_u64("SCRIBE_NAV_TIMEOUT_MS", DEFAULT_NAV_TIMEOUT_MS).max(1),
                ),
                settle: Duration::from_millis(read_env_u64("SCRIBE_SETTLE_MS", DEFAULT_SETTLE_MS)),
                ..timings
            },
            capture: CaptureConfig {
                stabilizer: StabilizerConfig {
                    initial_delay: Duration::from_secs(read_env_u64(
                        "SCRIBE_INITIAL_DELAY_SECS",
                        stabilizer.initial_delay.as_secs(),
                    )),
                    ceiling_ticks: read_env_u64("SCRIBE_MAX_WAIT_TICKS", stabilizer.ceiling_ticks)
                        .max(1),
                    stable_threshold: read_env_u32(
                        "SCRIBE_STABLE_THRESHOLD",
                        stabilizer.stable_threshold,
                    )
                    .max(1),
                    ..stabilizer
                },
                resolver: ResolverConfig {
                    scroll_step: read_env_i64("SCRIBE_REFERENCE_SCROLL_STEP", resolver.scroll_step)
                        .max(1),
                    ..resolver
                },
            },
        }
    }

    pub fn with_site_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.site_url = url;
        }
        self
    }
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_i64(name: &str, default_value: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-wide; keep every env-touching
    // assertion in this one test.
    #[test]
    fn test_env_overrides() {
        let keys = [
            "SCRIBE_SITE_URL",
            "SCRIBE_CHROMIUM_PATH",
            "SCRIBE_NAV_TIMEOUT_MS",
            "SCRIBE_SETTLE_MS",
            "SCRIBE_INITIAL_DELAY_SECS",
            "SCRIBE_MAX_WAIT_TICKS",
            "SCRIBE_STABLE_THRESHOLD",
            "SCRIBE_REFERENCE_SCROLL_STEP",
        ];
        for k in keys {
            std::env::remove_var(k);
        }

        let cfg = RunConfig::from_env();
        assert_eq!(cfg.site_url, DEFAULT_SITE_URL);
        assert!(cfg.chromium_path.is_none());
        assert_eq!(cfg.timings.navigation_timeout, Duration::from_secs(60));
        assert_eq!(cfg.timings.settle, Duration::from_secs(6));
        assert_eq!(cfg.capture.stabilizer.ceiling_ticks, 600);

        std::env::set_var("SCRIBE_SITE_URL", " https://example.test/ ");
        std::env::set_var("SCRIBE_CHROMIUM_PATH", "/opt/chrome");
        std::env::set_var("SCRIBE_SETTLE_MS", "0");
        std::env::set_var("SCRIBE_INITIAL_DELAY_SECS", "2");
        std::env::set_var("SCRIBE_MAX_WAIT_TICKS", "0");
        std::env::set_var("SCRIBE_STABLE_THRESHOLD", "4");
        std::env::set_var("SCRIBE_REFERENCE_SCROLL_STEP", "not a number");

        let cfg = RunConfig::from_env();
        assert_eq!(cfg.site_url, "https://example.test/");
        assert_eq!(cfg.chromium_path, Some(PathBuf::from("/opt/chrome")));
        assert_eq!(cfg.timings.settle, Duration::ZERO);
        assert_eq!(cfg.capture.stabilizer.initial_delay, Duration::from_secs(2));
        assert_eq!(cfg.capture.stabilizer.ceiling_ticks, 1);
        assert_eq!(cfg.capture.stabilizer.stable_threshold, 4);
        assert_eq!(cfg.capture.resolver.scroll_step, 400);
        assert_eq!(cfg.capture.stabilizer.scroll_every_ticks, 10);

        let cfg = cfg.with_site_url(Some("https://other.test".into()));
        assert_eq!(cfg.site_url, "https://other.test");

        for k in keys {
            std::env::remove_var(k);
        }
    }
}
