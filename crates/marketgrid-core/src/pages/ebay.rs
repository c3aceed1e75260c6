//! Page object for the eBay storefront.
//!
//! One declarative [`LocatorSet`] per logical element, most-specific
//! candidate first so markup drift falls through to looser matches. The
//! tables are tied to eBay's current DOM by design; this is not a
//! cross-site abstraction.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collector::{CollectError, CollectOutcome, Collector, ListingLocators, SearchPlan};
use crate::config::Settings;
use crate::driver::{Driver, DriverError, LoadState};
use crate::guard::{self, GuardError, TotalLocators};
use crate::locator::{Locator, LocatorSet};
use crate::resolver::{self, ResolveError};

/// Timeout slice for optional header elements (cart badge, readiness probes).
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub mod locators {
    use super::*;

    pub fn search_input() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//input[@id='gh-ac']"),
            Locator::css("input#gh-ac"),
            Locator::css("input[aria-label='Search for anything']"),
        ])
    }

    pub fn search_button() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//input[@id='gh-btn']"),
            Locator::css("input#gh-btn"),
            Locator::css("button#gh-search-btn"),
        ])
    }

    pub fn logo() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//a[@id='gh-la']"),
            Locator::css("a#gh-la"),
            Locator::css("a[aria-label='eBay Home']"),
        ])
    }

    pub fn sign_in() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//a[contains(@href, 'signin') or contains(text(), 'Sign in')]"),
            Locator::css("a[href*='signin']"),
        ])
    }

    pub fn cart_link() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//a[@id='gh-cart-i']"),
            Locator::css("a#gh-cart-i"),
            Locator::css("a[href*='cart.ebay.com']"),
        ])
    }

    pub fn cart_count() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//span[@id='gh-cart-n']"),
            Locator::css("span#gh-cart-n"),
        ])
    }

    pub fn category_dropdown() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//select[@id='gh-cat']"),
            Locator::css("select#gh-cat"),
        ])
    }

    pub fn daily_deals() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//a[contains(@href, 'deals') and contains(text(), 'Daily Deals')]"),
            Locator::css("a[href*='deals']"),
        ])
    }

    pub fn results_count() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//h1[contains(@class, 'srp-controls__count-heading')]"),
            Locator::css("h1.srp-controls__count-heading"),
        ])
    }

    pub fn result_items() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("ul.srp-results li.s-item"),
            Locator::css("li.s-item"),
            Locator::xpath("//li[contains(@class, 's-item')]"),
        ])
    }

    /// Resolved relative to one result item.
    pub fn item_price() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("span.s-item__price"),
            Locator::xpath(".//span[contains(@class, 's-item__price')]"),
        ])
    }

    /// Resolved relative to one result item.
    pub fn item_link() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("a.s-item__link"),
            Locator::xpath(".//a[contains(@class, 's-item__link')]"),
        ])
    }

    pub fn price_filter_max() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("input[aria-label='Maximum Value in $']"),
            Locator::css("input[aria-label*='Maximum Value']"),
            Locator::xpath("//input[contains(@aria-label, 'Maximum')]"),
        ])
    }

    pub fn price_filter_apply() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("button.x-textrange__button"),
            Locator::xpath("//button[contains(@aria-label, 'Submit price range')]"),
        ])
    }

    pub fn next_page() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("a.pagination__next"),
            Locator::xpath("//a[@aria-label='Go to next search page']"),
            Locator::css("button.pagination__next"),
        ])
    }

    pub fn add_to_cart() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("#atcBtn_btn_1"),
            Locator::xpath("//a[contains(@id, 'atcBtn')]"),
            Locator::css("div.vim-buybox a[href*='atc']"),
            Locator::text("Add to cart"),
        ])
    }

    /// `<select>` variation pickers (color, size) on a listing page.
    pub fn variation_pickers() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("div.x-msku select"),
            Locator::xpath("//select[contains(@name, 'msku') or contains(@id, 'msku')]"),
        ])
    }

    pub fn cart_subtotal() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath("//div[@data-test-id='SUBTOTAL']//span[contains(text(), '$')]"),
            Locator::css("div[data-test-id='SUBTOTAL'] span.text-display-span"),
        ])
    }

    pub fn cart_total_attribute_patterns() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::css("[data-test-id*='TOTAL'] span"),
            Locator::css("[class*='subtotal'] [class*='amount']"),
            Locator::css("[class*='total-row'] [class*='value']"),
        ])
    }

    pub fn cart_total_label_proximity() -> LocatorSet {
        LocatorSet::new(vec![
            Locator::xpath(
                "//*[contains(normalize-space(text()), 'Subtotal')]/following::span[contains(text(), '$')][1]",
            ),
            Locator::xpath("//span[contains(text(), 'Subtotal')]/ancestor::div[1]"),
        ])
    }
}

/// Listing locator bundle for the bounded collector.
pub fn listing_locators() -> ListingLocators {
    ListingLocators {
        search_input: locators::search_input(),
        search_submit: locators::search_button(),
        price_filter_input: locators::price_filter_max(),
        price_filter_apply: locators::price_filter_apply(),
        result_items: locators::result_items(),
        item_price: locators::item_price(),
        item_link: locators::item_link(),
        next_page: locators::next_page(),
    }
}

/// Cart-total strategy ladder for the budget guard.
pub fn total_locators() -> TotalLocators {
    TotalLocators {
        explicit: locators::cart_subtotal(),
        attribute_patterns: locators::cart_total_attribute_patterns(),
        label_proximity: locators::cart_total_label_proximity(),
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Outcome of one add-to-cart attempt. Best-effort steps stay auditable
/// instead of being swallowed.
#[derive(Debug)]
pub struct CartAddOutcome {
    pub url: String,
    pub added: bool,
    pub variations_selected: usize,
    pub detail: Option<String>,
}

/// Page object over an explicitly passed session handle. The page owns no
/// ambient state; the caller scopes acquisition and release of the driver.
pub struct EbayPage<'a, D: Driver> {
    driver: &'a mut D,
    settings: &'a Settings,
}

impl<'a, D: Driver> EbayPage<'a, D> {
    pub fn new(driver: &'a mut D, settings: &'a Settings) -> Self {
        Self { driver, settings }
    }

    /// Navigate to the homepage and wait, tolerantly, for it to look ready.
    /// Neither header probe failing is fatal; later flows carry their own
    /// waits.
    pub async fn open(&mut self) -> Result<(), PageError> {
        self.driver.navigate(&self.settings.base_url).await?;
        let _ = self
            .driver
            .wait_for_load(LoadState::DomContentLoaded, self.settings.navigation_timeout)
            .await;
        if !resolver::is_present(self.driver, &locators::search_input(), PROBE_TIMEOUT).await {
            let _ = resolver::is_present(self.driver, &locators::logo(), PROBE_TIMEOUT).await;
        }
        Ok(())
    }

    pub async fn is_search_box_visible(&mut self) -> bool {
        resolver::is_present(self.driver, &locators::search_input(), PROBE_TIMEOUT).await
    }

    pub async fn is_cart_visible(&mut self) -> bool {
        resolver::is_present(self.driver, &locators::cart_link(), PROBE_TIMEOUT).await
    }

    pub async fn search(&mut self, term: &str) -> Result<(), PageError> {
        let input = resolver::resolve(
            self.driver,
            &locators::search_input(),
            self.settings.action_timeout,
        )
        .await?;
        self.driver.fill(&input.element, term).await?;

        let button = resolver::resolve(
            self.driver,
            &locators::search_button(),
            self.settings.action_timeout,
        )
        .await?;
        self.driver.click(&button.element).await?;
        self.driver
            .wait_for_load(LoadState::DomContentLoaded, self.settings.action_timeout)
            .await?;
        Ok(())
    }

    /// Cart badge text, e.g. `"3"`. The badge is absent on an empty cart.
    pub async fn cart_count(&mut self) -> Result<String, PageError> {
        let badge =
            resolver::resolve(self.driver, &locators::cart_count(), PROBE_TIMEOUT).await?;
        Ok(self.driver.inner_text(&badge.element).await?)
    }

    pub async fn open_cart(&mut self) -> Result<(), PageError> {
        let cart = resolver::resolve(
            self.driver,
            &locators::cart_link(),
            self.settings.action_timeout,
        )
        .await?;
        self.driver.click(&cart.element).await?;
        self.driver
            .wait_for_load(LoadState::DomContentLoaded, self.settings.navigation_timeout)
            .await?;
        Ok(())
    }

    /// Search for `query` and collect up to `target` listing URLs priced at
    /// or under `price_ceiling`. See [`Collector`] for the loop contract.
    pub async fn collect_items_under_price(
        &mut self,
        query: &str,
        price_ceiling: f64,
        target: usize,
    ) -> Result<CollectOutcome, CollectError> {
        let listing = listing_locators();
        let plan = SearchPlan {
            query: query.to_string(),
            price_ceiling,
            target,
        };
        Collector::new(&mut *self.driver, &listing, self.settings.action_timeout)
            .collect(&plan)
            .await
    }

    /// Visit each listing URL and try to add it to the cart.
    ///
    /// Per-URL failures are contained and reported in the outcome list;
    /// only the final navigation back to the homepage is fatal.
    pub async fn add_items_to_cart(
        &mut self,
        urls: &[String],
    ) -> Result<Vec<CartAddOutcome>, PageError> {
        let mut outcomes = Vec::with_capacity(urls.len());

        for url in urls {
            let outcome = self.add_one_to_cart(url).await;
            if outcome.added {
                info!(url = url.as_str(), "added to cart");
            } else {
                warn!(url = url.as_str(), detail = ?outcome.detail, "item not added");
            }
            outcomes.push(outcome);
        }

        self.driver.navigate(&self.settings.base_url).await?;
        let _ = self
            .driver
            .wait_for_load(LoadState::DomContentLoaded, self.settings.navigation_timeout)
            .await;
        Ok(outcomes)
    }

    async fn add_one_to_cart(&mut self, url: &str) -> CartAddOutcome {
        if let Err(e) = self.driver.navigate(url).await {
            return CartAddOutcome {
                url: url.to_string(),
                added: false,
                variations_selected: 0,
                detail: Some(e.to_string()),
            };
        }
        let _ = self
            .driver
            .wait_for_load(LoadState::DomContentLoaded, self.settings.navigation_timeout)
            .await;

        let variations_selected = self.select_default_variations().await;

        let button = match resolver::resolve(
            self.driver,
            &locators::add_to_cart(),
            self.settings.action_timeout,
        )
        .await
        {
            Ok(found) => found,
            Err(e) => {
                return CartAddOutcome {
                    url: url.to_string(),
                    added: false,
                    variations_selected,
                    detail: Some(e.to_string()),
                }
            }
        };

        match self.driver.click(&button.element).await {
            Ok(()) => CartAddOutcome {
                url: url.to_string(),
                added: true,
                variations_selected,
                detail: None,
            },
            Err(e) => CartAddOutcome {
                url: url.to_string(),
                added: false,
                variations_selected,
                detail: Some(e.to_string()),
            },
        }
    }

    /// Pick the first real option of each variation dropdown, best-effort.
    /// Returns how many pickers were set, so callers can audit the step.
    async fn select_default_variations(&mut self) -> usize {
        let mut selected = 0;
        for locator in locators::variation_pickers().iter() {
            let pickers = match self.driver.find_all(locator).await {
                Ok(pickers) => pickers,
                Err(_) => continue,
            };
            if pickers.is_empty() {
                continue;
            }
            for picker in &pickers {
                // Index 0 is the "Select ..." placeholder.
                match self.driver.select_option_by_index(picker, 1).await {
                    Ok(()) => selected += 1,
                    Err(e) => debug!(error = %e, "variation picker not selectable"),
                }
            }
            break;
        }
        selected
    }

    /// Open-cart callers should land on the cart page first; the guard then
    /// walks its strategy ladder against the current document.
    pub async fn assert_cart_total_within_budget(
        &mut self,
        per_item_budget: f64,
        item_count: usize,
    ) -> Result<f64, GuardError> {
        let ladder = total_locators();
        guard::assert_total_within_budget(
            self.driver,
            &ladder,
            per_item_budget,
            item_count,
            self.settings.action_timeout,
        )
        .await
    }
}
