//! Cart-total discovery and budget assertion.
//!
//! The total is found through a prioritized strategy ladder: explicit
//! locators, then attribute-pattern search, then label-proximity text
//! search, then the largest plausible currency-looking value anywhere on
//! the page. The final rung is a documented best-effort heuristic, not a
//! guaranteed-correct parse: it assumes a total line is the largest figure
//! on the page and can mis-detect unrelated prices.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::driver::Driver;
use crate::locator::LocatorSet;
use crate::resolver;

lazy_static! {
    static ref MONEY_RE: Regex = Regex::new(r"\d[\d,]*(?:\.\d{1,2})?").unwrap();
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("no cart-total strategy produced a numeric value")]
    TotalNotFound,
    #[error("cart total {total:.2} exceeds budget {budget:.2}")]
    BudgetExceeded { total: f64, budget: f64 },
}

/// Locator ladder for one site's cart total, in strategy priority order.
#[derive(Debug, Clone)]
pub struct TotalLocators {
    /// Known-good selectors for the total element.
    pub explicit: LocatorSet,
    /// Attribute-pattern candidates, e.g. `[class*='total']`.
    pub attribute_patterns: LocatorSet,
    /// Text search anchored on a nearby label such as "Subtotal".
    pub label_proximity: LocatorSet,
}

fn money_tokens(text: &str) -> impl Iterator<Item = f64> + '_ {
    MONEY_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
}

/// Largest numeric token in `text`, with currency symbols and thousands
/// separators stripped. A total line is assumed to be the largest figure in
/// its row, e.g. "Subtotal: $1,234.56" yields 1234.56.
pub fn parse_money(text: &str) -> Option<f64> {
    money_tokens(text).fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// Smallest numeric token in `text`. Listing prices are often advertised as
/// a range ("$450.00 to $600.00"); the entry price is the gating figure.
pub fn parse_money_min(text: &str) -> Option<f64> {
    money_tokens(text).fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}

/// Find the cart total through the strategy ladder; first success wins.
pub async fn find_cart_total<D: Driver>(
    driver: &mut D,
    locators: &TotalLocators,
    timeout: Duration,
) -> Result<f64, GuardError> {
    let ladder = [
        ("explicit", &locators.explicit),
        ("attribute_pattern", &locators.attribute_patterns),
        ("label_proximity", &locators.label_proximity),
    ];

    for (strategy, set) in ladder {
        if set.is_empty() {
            continue;
        }
        let found = match resolver::resolve(driver, set, timeout).await {
            Ok(found) => found,
            Err(e) => {
                debug!(strategy, error = %e, "cart-total strategy found nothing");
                continue;
            }
        };
        let text = match driver.inner_text(&found.element).await {
            Ok(text) => text,
            Err(e) => {
                debug!(strategy, error = %e, "cart-total element unreadable");
                continue;
            }
        };
        if let Some(total) = parse_money(&text) {
            debug!(strategy, total, "cart total matched");
            return Ok(total);
        }
        debug!(strategy, text = text.as_str(), "no currency token in matched text");
    }

    // Last rung: largest currency-looking value on the whole page.
    if let Ok(body) = driver.page_text().await {
        if let Some(total) = parse_money(&body) {
            warn!(total, "cart total taken from page-wide currency scan");
            return Ok(total);
        }
    }

    Err(GuardError::TotalNotFound)
}

/// Assert the cart total does not exceed `per_item_budget * item_count`.
///
/// Returns the parsed total on success so callers can attach it to reports.
pub async fn assert_total_within_budget<D: Driver>(
    driver: &mut D,
    locators: &TotalLocators,
    per_item_budget: f64,
    item_count: usize,
    timeout: Duration,
) -> Result<f64, GuardError> {
    let total = find_cart_total(driver, locators, timeout).await?;
    let budget = per_item_budget * item_count as f64;
    if total > budget {
        return Err(GuardError::BudgetExceeded { total, budget });
    }
    Ok(total)
}
