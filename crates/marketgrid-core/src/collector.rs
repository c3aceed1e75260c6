//! Bounded search/collect/paginate loop.
//!
//! Drives a paginated result listing for a query, gates every item on an
//! extracted price, deduplicates by normalized listing URL, and halts on the
//! first of: target reached, feed exhausted, or the page ceiling hit.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::driver::{Driver, DriverError, LoadState};
use crate::guard::parse_money_min;
use crate::locator::LocatorSet;
use crate::resolver::{self, ResolveError};

/// Hard ceiling on pages visited in one collection call.
pub const MAX_PAGES: usize = 10;

/// Timeout slice for best-effort controls (price filter, next-page probe).
const OPTIONAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Path segment that marks a canonical listing URL.
const ITEM_PATH_MARKER: &str = "/itm/";

#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub query: String,
    pub price_ceiling: f64,
    pub target: usize,
}

/// Locator bundle for one site's result listing. Each field is an ordered
/// fallback set for a single logical element.
#[derive(Debug, Clone)]
pub struct ListingLocators {
    pub search_input: LocatorSet,
    pub search_submit: LocatorSet,
    /// Listing-side maximum-price filter; best-effort, may be absent.
    pub price_filter_input: LocatorSet,
    pub price_filter_apply: LocatorSet,
    /// Result item containers; the first candidate yielding a non-empty
    /// list is used.
    pub result_items: LocatorSet,
    /// Price sub-element, resolved relative to one result item.
    pub item_price: LocatorSet,
    /// Link sub-element, resolved relative to one result item; `href`
    /// carries the identifier.
    pub item_link: LocatorSet,
    pub next_page: LocatorSet,
}

/// Failures in the Searching/Paginating transitions are terminal for the
/// collection call; per-item extraction failures never are.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("search controls unavailable: {0}")]
    Search(ResolveError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Debug)]
pub struct CollectOutcome {
    /// Normalized identifiers, in collection order, length <= target.
    pub items: Vec<String>,
    pub pages_visited: usize,
    /// Whether the listing-side price filter was actually applied. The
    /// per-item price gate is authoritative either way.
    pub filter_applied: bool,
}

/// Mutated monotonically across the pagination loop; grows, never shrinks.
struct CollectionState {
    collected: Vec<String>,
    seen: HashSet<String>,
    pages_visited: usize,
    target: usize,
}

impl CollectionState {
    fn new(target: usize) -> Self {
        Self {
            collected: Vec::new(),
            seen: HashSet::new(),
            pages_visited: 0,
            target,
        }
    }

    fn push(&mut self, identifier: String) {
        if self.seen.contains(&identifier) {
            debug!(%identifier, "duplicate identifier skipped");
            return;
        }
        self.seen.insert(identifier.clone());
        self.collected.push(identifier);
    }

    fn full(&self) -> bool {
        self.collected.len() >= self.target
    }
}

enum Phase {
    Searching,
    Filtering,
    Paginating,
    Done,
}

pub struct Collector<'a, D: Driver> {
    driver: &'a mut D,
    locators: &'a ListingLocators,
    action_timeout: Duration,
}

impl<'a, D: Driver> Collector<'a, D> {
    pub fn new(driver: &'a mut D, locators: &'a ListingLocators, action_timeout: Duration) -> Self {
        Self {
            driver,
            locators,
            action_timeout,
        }
    }

    /// Run the full Searching -> Filtering -> Paginating -> Done loop.
    pub async fn collect(mut self, plan: &SearchPlan) -> Result<CollectOutcome, CollectError> {
        let mut state = CollectionState::new(plan.target);
        let mut filter_applied = false;
        let mut phase = Phase::Searching;

        loop {
            phase = match phase {
                Phase::Searching => {
                    self.submit_query(&plan.query).await?;
                    filter_applied = self.apply_price_filter(plan.price_ceiling).await;
                    state.pages_visited = 1;
                    Phase::Filtering
                }
                Phase::Filtering => {
                    let items = self.current_page_items().await;
                    if items.is_empty() {
                        // A zero-result page means the feed is exhausted,
                        // not a transient failure; never retried.
                        debug!(page = state.pages_visited, "no result items; feed exhausted");
                        Phase::Done
                    } else {
                        debug!(page = state.pages_visited, count = items.len(), "filtering page");
                        for item in &items {
                            if state.full() {
                                break;
                            }
                            if let Some(identifier) =
                                self.extract_identifier(item, plan.price_ceiling).await
                            {
                                state.push(identifier);
                            }
                        }
                        if state.full() {
                            Phase::Done
                        } else {
                            Phase::Paginating
                        }
                    }
                }
                Phase::Paginating => {
                    if state.pages_visited >= MAX_PAGES {
                        debug!("page ceiling reached");
                        Phase::Done
                    } else if self.goto_next_page().await? {
                        state.pages_visited += 1;
                        Phase::Filtering
                    } else {
                        Phase::Done
                    }
                }
                Phase::Done => break,
            };
        }

        state.collected.truncate(plan.target);
        info!(
            query = plan.query.as_str(),
            collected = state.collected.len(),
            pages = state.pages_visited,
            filter_applied,
            "collection finished"
        );
        Ok(CollectOutcome {
            items: state.collected,
            pages_visited: state.pages_visited,
            filter_applied,
        })
    }

    async fn submit_query(&mut self, query: &str) -> Result<(), CollectError> {
        let input = resolver::resolve(self.driver, &self.locators.search_input, self.action_timeout)
            .await
            .map_err(CollectError::Search)?;
        self.driver.fill(&input.element, query).await?;

        let submit =
            resolver::resolve(self.driver, &self.locators.search_submit, self.action_timeout)
                .await
                .map_err(CollectError::Search)?;
        self.driver.click(&submit.element).await?;
        self.driver
            .wait_for_load(LoadState::DomContentLoaded, self.action_timeout)
            .await?;
        Ok(())
    }

    /// Apply the listing-side price filter if its controls resolve.
    ///
    /// Non-fatal by design: the per-item gate downstream is the
    /// authoritative filter, this only trims the feed.
    async fn apply_price_filter(&mut self, ceiling: f64) -> bool {
        let input = match resolver::resolve(
            self.driver,
            &self.locators.price_filter_input,
            OPTIONAL_TIMEOUT,
        )
        .await
        {
            Ok(found) => found,
            Err(_) => {
                debug!("price filter not present; relying on per-item gate");
                return false;
            }
        };
        if self
            .driver
            .fill(&input.element, &format!("{ceiling:.2}"))
            .await
            .is_err()
        {
            return false;
        }
        let apply = match resolver::resolve(
            self.driver,
            &self.locators.price_filter_apply,
            OPTIONAL_TIMEOUT,
        )
        .await
        {
            Ok(found) => found,
            Err(_) => return false,
        };
        if self.driver.click(&apply.element).await.is_err() {
            return false;
        }
        let _ = self
            .driver
            .wait_for_load(LoadState::DomContentLoaded, self.action_timeout)
            .await;
        debug!(ceiling, "listing-side price filter applied");
        true
    }

    /// Result items on the current page: first container candidate yielding
    /// a non-empty list wins. Query failures count as empty.
    ///
    /// Containers go through the same bounded visibility wait as every
    /// other element; results often render after the load milestone, and an
    /// unwaited query would misread such a page as an exhausted feed.
    async fn current_page_items(&mut self) -> Vec<D::Element> {
        if let Err(e) =
            resolver::resolve(self.driver, &self.locators.result_items, self.action_timeout).await
        {
            debug!(error = %e, "no result container within the wait budget");
            return Vec::new();
        }
        for locator in self.locators.result_items.iter() {
            match self.driver.find_all(locator).await {
                Ok(items) if !items.is_empty() => {
                    debug!(%locator, count = items.len(), "result items located");
                    return items;
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!(%locator, error = %e, "item container query failed");
                    continue;
                }
            }
        }
        Vec::new()
    }

    /// Extract one item's identifier, or `None` to skip it.
    ///
    /// The price is a hard inclusion gate: an unresolvable or unparsable
    /// price excludes the item even when its link would otherwise be valid.
    async fn extract_identifier(&mut self, item: &D::Element, ceiling: f64) -> Option<String> {
        let price_el = self.find_in_item(item, &self.locators.item_price).await?;
        let price_text = self.driver.inner_text(&price_el).await.ok()?;
        let price = parse_money_min(&price_text)?;
        if price > ceiling {
            return None;
        }

        let link = self.find_in_item(item, &self.locators.item_link).await?;
        let href = self.driver.attribute(&link, "href").await.ok()??;
        normalize_listing_url(&href)
    }

    async fn find_in_item(&mut self, item: &D::Element, set: &LocatorSet) -> Option<D::Element> {
        for locator in set.iter() {
            if let Ok(Some(element)) = self.driver.find_in(item, locator).await {
                return Some(element);
            }
        }
        None
    }

    /// Advance to the next page if an enabled control resolves.
    async fn goto_next_page(&mut self) -> Result<bool, CollectError> {
        let next =
            match resolver::resolve(self.driver, &self.locators.next_page, OPTIONAL_TIMEOUT).await {
                Ok(found) => found,
                Err(_) => return Ok(false),
            };
        if !self.driver.is_enabled(&next.element).await.unwrap_or(false) {
            return Ok(false);
        }
        self.driver.click(&next.element).await?;
        self.driver
            .wait_for_load(LoadState::DomContentLoaded, self.action_timeout)
            .await?;
        Ok(true)
    }
}

/// Normalize a listing href into its canonical identifier URL.
///
/// Strips the query string (tracking parameters) and fragment while
/// preserving the canonical item path. Rejects values that are empty, the
/// `"null"` sentinel, unparsable, or missing the `/itm/` path marker.
pub fn normalize_listing_url(href: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    let mut parsed = Url::parse(trimmed).ok()?;
    if !parsed.path().contains(ITEM_PATH_MARKER) {
        return None;
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.to_string())
}
