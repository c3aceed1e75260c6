//! Failure artifacts: screenshots and page sources captured when a flow
//! goes wrong, named so parallel runs never collide.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes artifacts into one directory, creating it on first use.
pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save_screenshot(
        &self,
        label: &str,
        png: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        self.save(label, "png", png).await
    }

    pub async fn save_page_source(
        &self,
        label: &str,
        html: &str,
    ) -> Result<PathBuf, ArtifactError> {
        self.save(label, "html", html.as_bytes()).await
    }

    async fn save(&self, label: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let path = self.dir.join(format!("{}-{}.{ext}", sanitize(label), unique_stamp()));
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArtifactError::Write {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ArtifactError::Write {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "saved artifact");
        Ok(path)
    }
}

/// PID + epoch-millis keeps names unique across parallel test processes.
fn unique_stamp() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}-{}", std::process::id(), millis)
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
