//! Bounded-collector contract tests against a scripted paginated feed.

use std::time::Duration;

use async_trait::async_trait;

use marketgrid_core::collector::{
    CollectError, Collector, ListingLocators, SearchPlan, MAX_PAGES,
};
use marketgrid_core::driver::{Driver, DriverError, LoadState};
use marketgrid_core::locator::{Locator, LocatorSet};

const TIMEOUT: Duration = Duration::from_millis(50);

fn listing() -> ListingLocators {
    ListingLocators {
        search_input: LocatorSet::new(vec![Locator::css("#q")]),
        search_submit: LocatorSet::new(vec![Locator::css("#go")]),
        price_filter_input: LocatorSet::new(vec![Locator::css("#max-price")]),
        price_filter_apply: LocatorSet::new(vec![Locator::css("#apply-price")]),
        result_items: LocatorSet::new(vec![Locator::css("li.result")]),
        item_price: LocatorSet::new(vec![Locator::css(".price")]),
        item_link: LocatorSet::new(vec![Locator::css("a.link")]),
        next_page: LocatorSet::new(vec![Locator::css("a.next")]),
    }
}

fn plan(target: usize) -> SearchPlan {
    SearchPlan {
        query: "laptop".into(),
        price_ceiling: 500.0,
        target,
    }
}

#[derive(Clone, Debug)]
struct MockItem {
    price: Option<String>,
    href: Option<String>,
}

fn item(price: &str, href: &str) -> MockItem {
    MockItem {
        price: Some(price.into()),
        href: Some(href.into()),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum El {
    SearchInput,
    SearchButton,
    PriceFilterInput,
    PriceFilterApply,
    NextPage,
    Item { page: usize, idx: usize },
    Price { page: usize, idx: usize },
    Link { page: usize, idx: usize },
}

/// A scripted result feed: submitting the search lands on page 0, the
/// next-page control advances through `pages`. With `endless` set, new
/// pages are synthesized forever from `endless_item`.
struct MockDriver {
    pages: Vec<Vec<MockItem>>,
    current: usize,
    started: bool,
    search_available: bool,
    filter_present: bool,
    next_enabled: bool,
    endless: bool,
    endless_item: Option<MockItem>,
    /// Items enumerate only after a successful container wait, mimicking a
    /// page that renders its results after the load milestone.
    render_on_wait: bool,
    rendered: bool,
    filled: Vec<(String, String)>,
}

impl MockDriver {
    fn new(pages: Vec<Vec<MockItem>>) -> Self {
        Self {
            pages,
            current: 0,
            started: false,
            search_available: true,
            filter_present: false,
            next_enabled: true,
            endless: false,
            endless_item: None,
            render_on_wait: false,
            rendered: false,
            filled: Vec::new(),
        }
    }

    fn has_next(&self) -> bool {
        self.endless || self.current + 1 < self.pages.len()
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Element = El;

    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(format!("https://results.test/page/{}", self.current))
    }

    async fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<El, DriverError> {
        let timeout_err = Err(DriverError::Timeout { waited: timeout });
        match locator.to_string().as_str() {
            "css=#q" if self.search_available => Ok(El::SearchInput),
            "css=#go" if self.search_available => Ok(El::SearchButton),
            "css=#max-price" if self.filter_present => Ok(El::PriceFilterInput),
            "css=#apply-price" if self.filter_present => Ok(El::PriceFilterApply),
            "css=li.result" if self.started && !self.pages[self.current].is_empty() => {
                self.rendered = true;
                Ok(El::Item {
                    page: self.current,
                    idx: 0,
                })
            }
            "css=a.next" if self.started && self.has_next() => Ok(El::NextPage),
            _ => timeout_err,
        }
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<El>, DriverError> {
        if locator.to_string() != "css=li.result" || !self.started {
            return Ok(Vec::new());
        }
        if self.render_on_wait && !self.rendered {
            return Ok(Vec::new());
        }
        let page = self.current;
        Ok(self.pages[page]
            .iter()
            .enumerate()
            .map(|(idx, _)| El::Item { page, idx })
            .collect())
    }

    async fn find_in(&mut self, scope: &El, locator: &Locator) -> Result<Option<El>, DriverError> {
        let El::Item { page, idx } = *scope else {
            return Ok(None);
        };
        let entry = &self.pages[page][idx];
        match locator.to_string().as_str() {
            "css=.price" => Ok(entry.price.as_ref().map(|_| El::Price { page, idx })),
            "css=a.link" => Ok(entry.href.as_ref().map(|_| El::Link { page, idx })),
            _ => Ok(None),
        }
    }

    async fn click(&mut self, element: &El) -> Result<(), DriverError> {
        match element {
            El::SearchButton => {
                self.started = true;
                self.current = 0;
            }
            El::NextPage => {
                self.current += 1;
                self.rendered = false;
                if self.endless && self.current >= self.pages.len() {
                    let filler = self
                        .endless_item
                        .clone()
                        .expect("endless feed needs a filler item");
                    self.pages.push(vec![filler]);
                }
            }
            El::PriceFilterApply => {}
            other => {
                return Err(DriverError::Session(format!("unexpected click: {other:?}")));
            }
        }
        Ok(())
    }

    async fn fill(&mut self, element: &El, text: &str) -> Result<(), DriverError> {
        let field = match element {
            El::SearchInput => "query",
            El::PriceFilterInput => "max-price",
            other => {
                return Err(DriverError::Session(format!("unexpected fill: {other:?}")));
            }
        };
        self.filled.push((field.to_string(), text.to_string()));
        Ok(())
    }

    async fn inner_text(&mut self, element: &El) -> Result<String, DriverError> {
        match element {
            El::Price { page, idx } => Ok(self.pages[*page][*idx]
                .price
                .clone()
                .unwrap_or_default()),
            _ => Ok(String::new()),
        }
    }

    async fn attribute(&mut self, element: &El, name: &str) -> Result<Option<String>, DriverError> {
        match element {
            El::Link { page, idx } if name == "href" => {
                Ok(self.pages[*page][*idx].href.clone())
            }
            _ => Ok(None),
        }
    }

    async fn is_enabled(&mut self, element: &El) -> Result<bool, DriverError> {
        match element {
            El::NextPage => Ok(self.next_enabled),
            _ => Ok(true),
        }
    }

    async fn wait_for_load(
        &mut self,
        _state: LoadState,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        Ok(String::new())
    }
}

#[tokio::test]
async fn collects_across_pages_until_target() {
    // 3 passing items on page 1 and 4 on page 2: target 5 needs exactly 2 pages.
    let mut driver = MockDriver::new(vec![
        vec![
            item("$199.99", "https://www.ebay.com/itm/1?tracking=a"),
            item("$899.00", "https://www.ebay.com/itm/too-expensive"),
            item("$250.00", "https://www.ebay.com/itm/2"),
            MockItem {
                price: None,
                href: Some("https://www.ebay.com/itm/no-price".into()),
            },
            item("$300.00", "https://www.ebay.com/itm/3"),
        ],
        vec![
            item("$100.00", "https://www.ebay.com/itm/4"),
            item("$110.00", "https://www.ebay.com/itm/5"),
            item("$120.00", "https://www.ebay.com/itm/6"),
            item("$130.00", "https://www.ebay.com/itm/7"),
        ],
    ]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(5))
        .await
        .unwrap();

    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(
        outcome.items,
        vec![
            "https://www.ebay.com/itm/1",
            "https://www.ebay.com/itm/2",
            "https://www.ebay.com/itm/3",
            "https://www.ebay.com/itm/4",
            "https://www.ebay.com/itm/5",
        ]
    );
    assert_eq!(driver.filled, vec![("query".to_string(), "laptop".to_string())]);
}

#[tokio::test]
async fn stops_early_within_a_page_at_target() {
    let mut driver = MockDriver::new(vec![vec![
        item("$10.00", "https://www.ebay.com/itm/1"),
        item("$20.00", "https://www.ebay.com/itm/2"),
        item("$30.00", "https://www.ebay.com/itm/3"),
    ]]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(2))
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.pages_visited, 1);
}

#[tokio::test]
async fn deduplicates_by_normalized_identifier() {
    // The same listing appears with different tracking parameters on both
    // pages; it must count once.
    let mut driver = MockDriver::new(vec![
        vec![
            item("$10.00", "https://www.ebay.com/itm/1?src=page1"),
            item("$20.00", "https://www.ebay.com/itm/1?src=page1-again"),
        ],
        vec![
            item("$30.00", "https://www.ebay.com/itm/1?src=page2"),
            item("$40.00", "https://www.ebay.com/itm/2"),
        ],
    ]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(5))
        .await
        .unwrap();

    assert_eq!(
        outcome.items,
        vec!["https://www.ebay.com/itm/1", "https://www.ebay.com/itm/2"]
    );
}

#[tokio::test]
async fn unknown_price_is_a_hard_exclusion() {
    let mut driver = MockDriver::new(vec![vec![MockItem {
        price: None,
        href: Some("https://www.ebay.com/itm/otherwise-fine".into()),
    }]]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap();

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.pages_visited, 1);
}

#[tokio::test]
async fn invalid_identifiers_are_skipped() {
    let mut driver = MockDriver::new(vec![vec![
        item("$10.00", "null"),
        item("$10.00", "https://www.ebay.com/deals/not-a-listing"),
        MockItem {
            price: Some("$10.00".into()),
            href: None,
        },
        item("$10.00", "https://www.ebay.com/itm/valid"),
    ]]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(5))
        .await
        .unwrap();

    assert_eq!(outcome.items, vec!["https://www.ebay.com/itm/valid"]);
}

#[tokio::test]
async fn price_range_gates_on_entry_price() {
    let mut driver = MockDriver::new(vec![vec![
        item("$450.00 to $600.00", "https://www.ebay.com/itm/range-ok"),
        item("$550.00 to $700.00", "https://www.ebay.com/itm/range-high"),
    ]]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(5))
        .await
        .unwrap();

    assert_eq!(outcome.items, vec!["https://www.ebay.com/itm/range-ok"]);
}

#[tokio::test]
async fn endless_feed_terminates_at_page_ceiling() {
    let mut driver = MockDriver::new(vec![vec![item(
        "$999.99",
        "https://www.ebay.com/itm/over-budget-0",
    )]]);
    driver.endless = true;
    driver.endless_item = Some(item("$999.99", "https://www.ebay.com/itm/over-budget"));

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap();

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.pages_visited, MAX_PAGES);
}

#[tokio::test]
async fn late_rendering_results_are_awaited_not_exhausted() {
    // Items appear only after the container visibility wait succeeds; an
    // unwaited enumeration would misread this page as an exhausted feed.
    let mut driver = MockDriver::new(vec![vec![item("$10.00", "https://www.ebay.com/itm/1")]]);
    driver.render_on_wait = true;

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap();

    assert_eq!(outcome.items, vec!["https://www.ebay.com/itm/1"]);
    assert_eq!(outcome.pages_visited, 1);
}

#[tokio::test]
async fn zero_result_page_is_terminal() {
    let mut driver = MockDriver::new(vec![Vec::new(), vec![item(
        "$10.00",
        "https://www.ebay.com/itm/unreachable",
    )]]);

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap();

    // The empty first page means exhausted; page 2 is never visited.
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.pages_visited, 1);
}

#[tokio::test]
async fn disabled_next_control_ends_pagination() {
    let mut driver = MockDriver::new(vec![
        vec![item("$10.00", "https://www.ebay.com/itm/1")],
        vec![item("$20.00", "https://www.ebay.com/itm/2")],
    ]);
    driver.next_enabled = false;

    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(5))
        .await
        .unwrap();

    assert_eq!(outcome.items, vec!["https://www.ebay.com/itm/1"]);
    assert_eq!(outcome.pages_visited, 1);
}

#[tokio::test]
async fn price_filter_is_best_effort_and_audited() {
    let pages = vec![vec![item("$10.00", "https://www.ebay.com/itm/1")]];

    let mut driver = MockDriver::new(pages.clone());
    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap();
    assert!(!outcome.filter_applied);

    let mut driver = MockDriver::new(pages);
    driver.filter_present = true;
    let outcome = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap();
    assert!(outcome.filter_applied);
    assert!(driver
        .filled
        .contains(&("max-price".to_string(), "500.00".to_string())));
}

#[tokio::test]
async fn missing_search_controls_are_terminal() {
    let mut driver = MockDriver::new(vec![vec![item("$10.00", "https://www.ebay.com/itm/1")]]);
    driver.search_available = false;

    let err = Collector::new(&mut driver, &listing(), TIMEOUT)
        .collect(&plan(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectError::Search(_)));
}
