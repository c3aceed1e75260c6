//! fantoccini-backed implementation of the core [`Driver`] trait.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use marketgrid_core::config::{BrowserKind, Settings};
use marketgrid_core::driver::{Driver, DriverError, LoadState};
use marketgrid_core::locator::Locator;

const VISIBILITY_POLL: Duration = Duration::from_millis(100);
const NETWORK_QUIET_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to WebDriver at {url}: {source}")]
    Connect {
        url: String,
        source: fantoccini::error::NewSessionError,
    },
    #[error("failed to close session: {0}")]
    Close(#[from] CmdError),
}

/// W3C capabilities for `kind`, with overrides merged on top.
pub fn capabilities(
    kind: BrowserKind,
    headless: bool,
    overrides: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut caps = Map::new();
    match kind {
        BrowserKind::Chrome => {
            let mut args = vec!["--window-size=1920,1080", "--disable-gpu"];
            if headless {
                args.push("--headless=new");
            }
            caps.insert("browserName".into(), json!("chrome"));
            caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
        }
        BrowserKind::Firefox => {
            let mut args: Vec<&str> = vec!["--width=1920", "--height=1080"];
            if headless {
                args.push("-headless");
            }
            caps.insert("browserName".into(), json!("firefox"));
            caps.insert("moz:firefoxOptions".into(), json!({ "args": args }));
        }
    }
    caps.insert("acceptInsecureCerts".into(), json!(true));
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            caps.insert(key.clone(), value.clone());
        }
    }
    caps
}

/// One live browser session, owned exclusively by the test flow driving it.
pub struct WebDriverSession {
    client: Client,
    settings: Settings,
}

impl WebDriverSession {
    pub async fn connect(webdriver_url: &str, settings: Settings) -> Result<Self, SessionError> {
        Self::connect_with_overrides(webdriver_url, settings, None).await
    }

    pub async fn connect_with_overrides(
        webdriver_url: &str,
        settings: Settings,
        overrides: Option<&Map<String, Value>>,
    ) -> Result<Self, SessionError> {
        let caps = capabilities(settings.browser, settings.headless, overrides);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .map_err(|source| SessionError::Connect {
                url: webdriver_url.to_string(),
                source,
            })?;
        Ok(Self { client, settings })
    }

    pub async fn close(self) -> Result<(), SessionError> {
        self.client.close().await?;
        Ok(())
    }

    /// Slow-motion pause after mutating actions, when configured.
    async fn pace(&self) {
        if !self.settings.slow_mo.is_zero() {
            sleep(self.settings.slow_mo).await;
        }
    }

    async fn find_one(&self, locator: &Locator) -> Result<Element, CmdError> {
        match locator {
            Locator::Css(css) => self.client.find(WdLocator::Css(css)).await,
            Locator::XPath(xpath) => self.client.find(WdLocator::XPath(xpath)).await,
            Locator::Text(needle) => {
                let xpath = text_xpath(needle, false);
                self.client.find(WdLocator::XPath(&xpath)).await
            }
        }
    }

    async fn ready_state(&self) -> Result<String, CmdError> {
        let value = self
            .client
            .execute("return document.readyState;", vec![])
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

/// Lower a text locator to XPath. `relative` anchors the search inside a
/// scope element instead of the document root.
fn text_xpath(needle: &str, relative: bool) -> String {
    let axis = if relative { ".//*" } else { "//*" };
    // XPath 1.0 has no escaping; switch quote style when the needle
    // contains an apostrophe.
    if needle.contains('\'') {
        format!("{axis}[contains(normalize-space(.), \"{needle}\")]")
    } else {
        format!("{axis}[contains(normalize-space(.), '{needle}')]")
    }
}

fn cmd_err(e: CmdError) -> DriverError {
    let msg = e.to_string();
    if msg.contains("stale") {
        DriverError::Lost(msg)
    } else {
        DriverError::Session(msg)
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        debug!(url, "navigating");
        self.client
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        self.pace().await;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(cmd_err)
    }

    async fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Element, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.find_one(locator).await {
                if element.is_displayed().await.unwrap_or(false) {
                    return Ok(element);
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout { waited: timeout });
            }
            sleep(VISIBILITY_POLL).await;
        }
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<Element>, DriverError> {
        let found = match locator {
            Locator::Css(css) => self.client.find_all(WdLocator::Css(css)).await,
            Locator::XPath(xpath) => self.client.find_all(WdLocator::XPath(xpath)).await,
            Locator::Text(needle) => {
                let xpath = text_xpath(needle, false);
                self.client.find_all(WdLocator::XPath(&xpath)).await
            }
        };
        found.map_err(cmd_err)
    }

    async fn find_in(
        &mut self,
        scope: &Element,
        locator: &Locator,
    ) -> Result<Option<Element>, DriverError> {
        let found = match locator {
            Locator::Css(css) => scope.find(WdLocator::Css(css)).await,
            Locator::XPath(xpath) => scope.find(WdLocator::XPath(xpath)).await,
            Locator::Text(needle) => {
                let xpath = text_xpath(needle, true);
                scope.find(WdLocator::XPath(&xpath)).await
            }
        };
        match found {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(cmd_err(e)),
        }
    }

    async fn click(&mut self, element: &Element) -> Result<(), DriverError> {
        element.click().await.map_err(cmd_err)?;
        self.pace().await;
        Ok(())
    }

    async fn fill(&mut self, element: &Element, text: &str) -> Result<(), DriverError> {
        element.clear().await.map_err(cmd_err)?;
        element.send_keys(text).await.map_err(cmd_err)?;
        self.pace().await;
        Ok(())
    }

    async fn inner_text(&mut self, element: &Element) -> Result<String, DriverError> {
        element.text().await.map_err(cmd_err)
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        element.attr(name).await.map_err(cmd_err)
    }

    async fn is_enabled(&mut self, element: &Element) -> Result<bool, DriverError> {
        element.is_enabled().await.map_err(cmd_err)
    }

    async fn wait_for_load(
        &mut self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        let wanted = |ready: &str| match state {
            LoadState::DomContentLoaded => ready == "interactive" || ready == "complete",
            LoadState::NetworkIdle => ready == "complete",
        };
        loop {
            match self.ready_state().await {
                Ok(ready) if wanted(&ready) => break,
                Ok(_) | Err(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout { waited: timeout });
            }
            sleep(VISIBILITY_POLL).await;
        }
        // WebDriver exposes no in-flight request count; a short quiet delay
        // after readiness is the closest approximation of "network idle".
        if state == LoadState::NetworkIdle {
            sleep(NETWORK_QUIET_DELAY).await;
        }
        Ok(())
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        let value = self
            .client
            .execute(
                "return document.body ? document.body.innerText : '';",
                vec![],
            )
            .await
            .map_err(cmd_err)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn select_option_by_index(
        &mut self,
        element: &Element,
        index: usize,
    ) -> Result<(), DriverError> {
        element.select_by_index(index).await.map_err(cmd_err)?;
        self.pace().await;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.client.screenshot().await.map_err(cmd_err)
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        self.client.source().await.map_err(cmd_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_capabilities_carry_headless_flag() {
        let caps = capabilities(BrowserKind::Chrome, true, None);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert_eq!(caps["browserName"], "chrome");
    }

    #[test]
    fn firefox_capabilities_omit_headless_when_headed() {
        let caps = capabilities(BrowserKind::Firefox, false, None);
        let args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert!(!args.iter().any(|a| a == "-headless"));
    }

    #[test]
    fn capability_overrides_replace_defaults() {
        let mut overrides = Map::new();
        overrides.insert("browserName".into(), json!("chrome-beta"));
        let caps = capabilities(BrowserKind::Chrome, false, Some(&overrides));
        assert_eq!(caps["browserName"], "chrome-beta");
    }

    #[test]
    fn text_xpath_switches_quote_style() {
        assert_eq!(
            text_xpath("Add to cart", false),
            "//*[contains(normalize-space(.), 'Add to cart')]"
        );
        assert!(text_xpath("it's here", true).starts_with(".//*"));
        assert!(text_xpath("it's here", false).contains('"'));
    }
}
