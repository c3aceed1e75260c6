//! Locates and supervises a local WebDriver server process
//! (chromedriver or geckodriver).

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use marketgrid_core::config::BrowserKind;

/// Common paths where chromedriver might be installed.
const CHROMEDRIVER_PATHS: &[&str] = &[
    "/usr/bin/chromedriver",
    "/usr/local/bin/chromedriver",
    "/snap/bin/chromium.chromedriver",
];

/// Common paths where geckodriver might be installed.
const GECKODRIVER_PATHS: &[&str] = &[
    "/usr/bin/geckodriver",
    "/usr/local/bin/geckodriver",
    "/snap/bin/geckodriver",
];

const READY_ATTEMPTS: u32 = 30;
const READY_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0} not found; install it or put it on PATH")]
    NotFound(&'static str),
    #[error("failed to spawn WebDriver process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("WebDriver did not become ready within {attempts} attempts")]
    NotReady { attempts: u32 },
}

fn driver_binary_name(kind: BrowserKind) -> &'static str {
    match kind {
        BrowserKind::Chrome => "chromedriver",
        BrowserKind::Firefox => "geckodriver",
    }
}

/// Conventional listen port of each driver binary.
pub fn default_port(kind: BrowserKind) -> u16 {
    match kind {
        BrowserKind::Chrome => 9515,
        BrowserKind::Firefox => 4444,
    }
}

fn which(binary: &str) -> Option<String> {
    let output = Command::new("which").arg(binary).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8(output.stdout).ok()?;
    let path = path.trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Find the WebDriver binary for `kind`: PATH first, then common locations.
pub fn find_driver_binary(kind: BrowserKind) -> Option<String> {
    let name = driver_binary_name(kind);
    if let Some(path) = which(name) {
        return Some(path);
    }
    let fallbacks = match kind {
        BrowserKind::Chrome => CHROMEDRIVER_PATHS,
        BrowserKind::Firefox => GECKODRIVER_PATHS,
    };
    fallbacks
        .iter()
        .find(|path| Path::new(path).exists())
        .map(|path| path.to_string())
}

/// Handle to a running WebDriver server process. Killed and reaped on drop.
pub struct DriverProcess {
    child: Child,
    port: u16,
}

impl DriverProcess {
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        info!("shutting down WebDriver process");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawn the WebDriver server for `kind` on `port` and wait for its
/// `/status` endpoint to come up.
pub async fn launch(kind: BrowserKind, port: u16) -> Result<DriverProcess, LaunchError> {
    let binary =
        find_driver_binary(kind).ok_or_else(|| LaunchError::NotFound(driver_binary_name(kind)))?;

    info!(binary = binary.as_str(), port, "launching WebDriver server");
    let mut cmd = Command::new(&binary);
    match kind {
        BrowserKind::Chrome => {
            cmd.arg(format!("--port={port}"));
        }
        BrowserKind::Firefox => {
            cmd.args(["--port", &port.to_string()]);
        }
    }
    let mut child = cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;

    let status_url = format!("http://localhost:{port}/status");
    let client = reqwest::Client::new();

    for attempt in 1..=READY_ATTEMPTS {
        sleep(READY_POLL).await;

        match client.get(&status_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(attempt, "WebDriver server ready");
                return Ok(DriverProcess { child, port });
            }
            Ok(_) => {
                warn!(attempt, "WebDriver responded but not ready yet");
            }
            Err(_) => {
                if attempt % 5 == 0 {
                    info!(attempt, "waiting for WebDriver server...");
                }
            }
        }
    }

    let _ = child.kill();
    let _ = child.wait();
    Err(LaunchError::NotReady {
        attempts: READY_ATTEMPTS,
    })
}
