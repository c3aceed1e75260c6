//! Environment-driven harness settings.
//!
//! All values are externally supplied and read-only to the core. Malformed
//! values fall back to defaults with a warning rather than aborting a run.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://www.ebay.com";
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Target browser engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
        }
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserKind::Chrome),
            "firefox" | "gecko" => Ok(BrowserKind::Firefox),
            other => Err(format!("unsupported browser: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub browser: BrowserKind,
    pub headless: bool,
    /// Pause inserted after each mutating action.
    pub slow_mo: Duration,
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    pub base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: false,
            slow_mo: Duration::ZERO,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Build settings from `MG_*` environment variables, defaulting any
    /// variable that is unset or malformed.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Ok(value) = std::env::var("MG_BROWSER") {
            match value.parse() {
                Ok(kind) => settings.browser = kind,
                Err(e) => warn!("MG_BROWSER: {e}; keeping {}", settings.browser.as_str()),
            }
        }
        settings.headless = env_bool("MG_HEADLESS", settings.headless);
        settings.slow_mo = env_millis("MG_SLOW_MO_MS", settings.slow_mo);
        settings.navigation_timeout =
            env_millis("MG_NAVIGATION_TIMEOUT_MS", settings.navigation_timeout);
        settings.action_timeout = env_millis("MG_ACTION_TIMEOUT_MS", settings.action_timeout);
        if let Ok(value) = std::env::var("MG_BASE_URL") {
            if !value.trim().is_empty() {
                settings.base_url = value;
            }
        }

        settings
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!("{key}: not a millisecond count: {value:?}; using {default:?}");
                default
            }
        },
        Err(_) => default,
    }
}
