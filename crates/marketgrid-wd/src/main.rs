use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use marketgrid_core::config::{BrowserKind, Settings};
use marketgrid_core::grid::{GridConfig, GridMode};
use marketgrid_core::pages::ebay::EbayPage;
use marketgrid_wd::{launch, launcher, ArtifactSink, WebDriverSession};

#[derive(Parser)]
#[command(name = "marketgrid", version, about = "eBay purchase-flow checks across a browser grid")]
struct Args {
    /// Browser grid config file (JSON)
    #[arg(long, default_value = "browsers.json")]
    grid_config: PathBuf,

    /// Which grid subset to run: all, chrome, firefox, desktop
    #[arg(long, default_value = "all")]
    mode: String,

    /// Connect to an already-running WebDriver instead of launching one
    #[arg(long)]
    driver_url: Option<String>,

    /// Directory for failure screenshots and page sources
    #[arg(long, default_value = "reports")]
    reports: PathBuf,

    #[command(subcommand)]
    check: Check,
}

#[derive(Subcommand)]
enum Check {
    /// Open the homepage and verify the search box and cart are present
    Smoke,
    /// Search and collect listing URLs at or under a price ceiling
    Collect {
        #[arg(long, default_value = "laptop")]
        query: String,
        #[arg(long, default_value_t = 500.0)]
        max_price: f64,
        #[arg(long, default_value_t = 3)]
        target: usize,
    },
    /// Full flow: collect, add to cart, assert the cart total fits the budget
    Cart {
        #[arg(long, default_value = "laptop")]
        query: String,
        #[arg(long, default_value_t = 500.0)]
        max_price: f64,
        #[arg(long, default_value_t = 3)]
        target: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode: GridMode = args.mode.parse()?;
    let grid = GridConfig::load_or_default(&args.grid_config).await?;
    let sink = ArtifactSink::new(&args.reports);

    let mut failures = 0usize;
    for &kind in mode.browsers() {
        info!(browser = kind.as_str(), "starting grid entry");
        if let Err(e) = run_browser(kind, &grid, &args, &sink).await {
            error!(browser = kind.as_str(), error = %e, "grid entry failed");
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(format!("{failures} grid entries failed").into());
    }
    Ok(())
}

async fn run_browser(
    kind: BrowserKind,
    grid: &GridConfig,
    args: &Args,
    sink: &ArtifactSink,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env();
    settings.browser = kind;

    // Hold the process handle for the whole run; Drop kills the driver.
    let (url, _process) = match &args.driver_url {
        Some(url) => (url.clone(), None),
        None => {
            let process = launch(kind, launcher::default_port(kind)).await?;
            (process.url(), Some(process))
        }
    };

    let overrides = grid.capabilities_for(kind);
    let mut session =
        WebDriverSession::connect_with_overrides(&url, settings.clone(), overrides).await?;

    let result = run_check(&mut session, &settings, &args.check).await;
    if result.is_err() {
        capture_failure(&mut session, sink, kind).await;
    }
    session.close().await?;
    result
}

async fn run_check(
    session: &mut WebDriverSession,
    settings: &Settings,
    check: &Check,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut page = EbayPage::new(session, settings);
    page.open().await?;

    match check {
        Check::Smoke => {
            if !page.is_search_box_visible().await {
                return Err("search box not visible on homepage".into());
            }
            if !page.is_cart_visible().await {
                return Err("cart control not visible on homepage".into());
            }
            info!("homepage smoke check passed");
        }
        Check::Collect {
            query,
            max_price,
            target,
        } => {
            let outcome = page
                .collect_items_under_price(query, *max_price, *target)
                .await?;
            info!(
                collected = outcome.items.len(),
                pages = outcome.pages_visited,
                filter_applied = outcome.filter_applied,
                "collection finished"
            );
            for url in &outcome.items {
                println!("{url}");
            }
        }
        Check::Cart {
            query,
            max_price,
            target,
        } => {
            let outcome = page
                .collect_items_under_price(query, *max_price, *target)
                .await?;
            if outcome.items.is_empty() {
                return Err("no qualifying listings found".into());
            }
            let additions = page.add_items_to_cart(&outcome.items).await?;
            let added = additions.iter().filter(|a| a.added).count();
            if added == 0 {
                return Err("no listings could be added to the cart".into());
            }
            page.open_cart().await?;
            let total = page
                .assert_cart_total_within_budget(*max_price, added)
                .await?;
            info!(total, added, "cart total is within budget");
        }
    }
    Ok(())
}

async fn capture_failure(session: &mut WebDriverSession, sink: &ArtifactSink, kind: BrowserKind) {
    use marketgrid_core::driver::Driver;

    match session.screenshot().await {
        Ok(png) => {
            if let Err(e) = sink.save_screenshot(kind.as_str(), &png).await {
                warn!(error = %e, "could not save failure screenshot");
            }
        }
        Err(e) => warn!(error = %e, "could not capture failure screenshot"),
    }

    match session.page_source().await {
        Ok(html) => {
            if let Err(e) = sink.save_page_source(kind.as_str(), &html).await {
                warn!(error = %e, "could not save failure page source");
            }
        }
        Err(e) => warn!(error = %e, "could not capture failure page source"),
    }
}
