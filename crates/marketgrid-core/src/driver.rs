//! The browser driver abstraction the core operates against.
//!
//! Backends (a live WebDriver session, or test mocks) implement [`Driver`];
//! everything else in this crate is backend-independent.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::locator::Locator;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timed out after {waited:?}")]
    Timeout { waited: Duration },
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("session error: {0}")]
    Session(String),
    /// The element handle was invalidated, typically by a navigation.
    #[error("element handle lost: {0}")]
    Lost(String),
    #[error("operation not supported by this backend: {0}")]
    NotSupported(String),
}

/// Document load milestones a caller can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    /// Best-effort in non-CDP backends; approximated by readiness plus a
    /// quiet delay.
    NetworkIdle,
}

/// One browser session driven sequentially by a single test flow.
///
/// Element handles are only valid until the next navigation. All waits carry
/// explicit deadlines; there is no cancellation signal beyond a wait's
/// timeout elapsing.
#[async_trait]
pub trait Driver: Send {
    type Element: Clone + Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    /// Locate a node and wait for it to become visible within `timeout`.
    async fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element, DriverError>;

    /// All current matches for `locator`, visible or not. No waiting.
    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<Self::Element>, DriverError>;

    /// First match for `locator` inside `scope`, or `None`.
    async fn find_in(
        &mut self,
        scope: &Self::Element,
        locator: &Locator,
    ) -> Result<Option<Self::Element>, DriverError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), DriverError>;

    async fn fill(&mut self, element: &Self::Element, text: &str) -> Result<(), DriverError>;

    async fn inner_text(&mut self, element: &Self::Element) -> Result<String, DriverError>;

    async fn attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn is_enabled(&mut self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn wait_for_load(
        &mut self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Full visible text of the current document.
    async fn page_text(&mut self) -> Result<String, DriverError>;

    /// Select an option of a `<select>`-like element by index.
    async fn select_option_by_index(
        &mut self,
        _element: &Self::Element,
        _index: usize,
    ) -> Result<(), DriverError> {
        Err(DriverError::NotSupported("select_option_by_index".into()))
    }

    /// Capture a screenshot of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::NotSupported("screenshot".into()))
    }

    /// Full HTML source of the current document.
    async fn page_source(&mut self) -> Result<String, DriverError> {
        Err(DriverError::NotSupported("page_source".into()))
    }
}
