//! Browser-grid configuration: which engines a run targets.
//!
//! A grid run sweeps the same scenarios across a named subset of browsers,
//! one session per browser, sequentially. The subset comes either from a
//! [`GridMode`] name or from a JSON config file.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BrowserKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read grid config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse grid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown browser in grid config: {0}")]
    UnknownBrowser(String),
}

/// One browser entry in the grid config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEntry {
    pub name: String,
    /// Raw capability overrides merged into the session capabilities.
    #[serde(default)]
    pub capabilities: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub browsers: Vec<BrowserEntry>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            browsers: vec![BrowserEntry {
                name: "chrome".to_string(),
                capabilities: serde_json::Map::new(),
            }],
        }
    }
}

impl GridConfig {
    /// Load from `path`, or return the default single-browser config when
    /// the file does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: GridConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Parse entry names into browser kinds, in declared order.
    pub fn kinds(&self) -> Result<Vec<BrowserKind>, ConfigError> {
        self.browsers
            .iter()
            .map(|entry| {
                entry
                    .name
                    .parse()
                    .map_err(|_| ConfigError::UnknownBrowser(entry.name.clone()))
            })
            .collect()
    }

    /// Capability overrides for one browser, if the config carries any.
    pub fn capabilities_for(
        &self,
        kind: BrowserKind,
    ) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.browsers
            .iter()
            .find(|entry| entry.name.parse() == Ok(kind))
            .map(|entry| &entry.capabilities)
            .filter(|caps| !caps.is_empty())
    }
}

/// Named execution subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    All,
    Chrome,
    Firefox,
    /// Alias of `All`; kept for parity with the original grid names.
    Desktop,
}

impl GridMode {
    pub fn browsers(&self) -> &'static [BrowserKind] {
        match self {
            GridMode::All | GridMode::Desktop => &[BrowserKind::Chrome, BrowserKind::Firefox],
            GridMode::Chrome => &[BrowserKind::Chrome],
            GridMode::Firefox => &[BrowserKind::Firefox],
        }
    }
}

impl FromStr for GridMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(GridMode::All),
            "chrome" | "chromium" => Ok(GridMode::Chrome),
            "firefox" => Ok(GridMode::Firefox),
            "desktop" => Ok(GridMode::Desktop),
            other => Err(format!("unknown grid mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_maps_to_browser_list() {
        assert_eq!(
            GridMode::All.browsers(),
            &[BrowserKind::Chrome, BrowserKind::Firefox]
        );
        assert_eq!(GridMode::Firefox.browsers(), &[BrowserKind::Firefox]);
        assert_eq!("desktop".parse::<GridMode>(), Ok(GridMode::Desktop));
        assert!("mobile".parse::<GridMode>().is_err());
    }

    #[test]
    fn default_config_is_single_chrome() {
        let config = GridConfig::default();
        assert_eq!(config.kinds().unwrap(), vec![BrowserKind::Chrome]);
    }

    #[test]
    fn unknown_browser_is_rejected() {
        let config = GridConfig {
            browsers: vec![BrowserEntry {
                name: "webkit".into(),
                capabilities: serde_json::Map::new(),
            }],
        };
        assert!(matches!(
            config.kinds(),
            Err(ConfigError::UnknownBrowser(name)) if name == "webkit"
        ));
    }
}
