//! Ordered locator-fallback resolution.
//!
//! Given a [`LocatorSet`], try each candidate in declared order against the
//! live document and return the first that resolves to a visible element
//! within its timeout slice. The timeout budget applies per candidate, so
//! worst-case latency is `set.len() * timeout` when every candidate fails.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::driver::Driver;
use crate::locator::{Locator, LocatorSet};

/// One failed candidate, recorded in declared order for diagnosability.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub locator: Locator,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Malformed call: the locator set had no candidates.
    #[error("locator set is empty")]
    InvalidInput,
    /// Every candidate timed out. Carries exactly one reason per candidate.
    #[error("element not found with any of {} locator(s)", attempts.len())]
    ElementNotFound { attempts: Vec<Attempt> },
}

/// A live element handle plus the index of the candidate that found it.
///
/// Valid only for the current document; invalidated by navigation.
#[derive(Debug, Clone)]
pub struct Resolved<E> {
    pub element: E,
    pub index: usize,
}

/// Resolve `set` against the current document.
///
/// Short-circuits on the first candidate that becomes visible; candidates
/// after the winner are never attempted. Read-only against the document.
pub async fn resolve<D: Driver>(
    driver: &mut D,
    set: &LocatorSet,
    timeout: Duration,
) -> Result<Resolved<D::Element>, ResolveError> {
    if set.is_empty() {
        return Err(ResolveError::InvalidInput);
    }

    let mut attempts = Vec::with_capacity(set.len());
    for (index, locator) in set.iter().enumerate() {
        match driver.wait_visible(locator, timeout).await {
            Ok(element) => {
                debug!(%locator, index, "locator resolved");
                return Ok(Resolved { element, index });
            }
            Err(e) => {
                debug!(%locator, index, error = %e, "locator candidate failed");
                attempts.push(Attempt {
                    locator: locator.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Err(ResolveError::ElementNotFound { attempts })
}

/// Boolean probe over [`resolve`]: any failure becomes `false`.
///
/// Used for non-critical visibility checks; never propagates an error.
pub async fn is_present<D: Driver>(driver: &mut D, set: &LocatorSet, timeout: Duration) -> bool {
    resolve(driver, set, timeout).await.is_ok()
}
