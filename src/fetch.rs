use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::error::SyncError;

const SIGNIN_MARKER: &str = "to continue to google docs";

/// Load the document export: local file if configured, otherwise the network.
pub async fn load_html(config: &Config) -> Result<String> {
    if let Some(path) = &config.html_path {
        info!("Reading document export from {}", path.display());
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    fetch_export(&config.export_url).await
}

/// Fetch the export in one buffered request. No retries.
pub async fn fetch_export(url: &str) -> Result<String> {
    let client = reqwest::Client::new();

    info!("Fetching document export: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {url}"))?;
    let status = response.status().as_u16();
    let html = response
        .text()
        .await
        .context("Failed to read document export body")?;

    check_export(status, &html)?;
    info!("Fetched {} bytes", html.len());
    Ok(html)
}

/// Reject non-2xx responses and the sign-in page served for private docs.
pub fn check_export(status: u16, body: &str) -> Result<(), SyncError> {
    if !(200..300).contains(&status) {
        return Err(SyncError::FetchStatus { status });
    }
    if body.to_lowercase().contains(SIGNIN_MARKER) {
        return Err(SyncError::FetchBlocked);
    }
    Ok(())
}
