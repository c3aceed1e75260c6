pub mod collector;
pub mod config;
pub mod driver;
pub mod grid;
pub mod guard;
pub mod locator;
pub mod pages;
pub mod resolver;

pub use collector::{CollectError, CollectOutcome, Collector, ListingLocators, SearchPlan};
pub use config::{BrowserKind, Settings};
pub use driver::{Driver, DriverError, LoadState};
pub use locator::{Locator, LocatorSet};
pub use resolver::{is_present, resolve, ResolveError, Resolved};
