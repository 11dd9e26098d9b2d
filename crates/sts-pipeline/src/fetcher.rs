use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::config::PipelineConfig;
use crate::extract::Record;
use crate::sanitize::IMAGE_EXTENSION;
use crate::session::Session;

/// An image that was downloaded and saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    #[serde(alias = "protocolName")]
    pub record_name: String,
    pub filename: String,
    #[serde(alias = "originalUrl")]
    pub source_url: String,
    #[serde(alias = "size")]
    pub byte_size: usize,
}

/// An image that couldn't be downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDownload {
    pub record_name: String,
    pub source_url: String,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid image URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("navigation failed: {0:#}")]
    Navigation(anyhow::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error {0}")]
    Status(u16),
    #[error("image too small: {size} bytes (minimum {min})")]
    TooSmall { size: usize, min: usize },
    #[error("couldn't save image: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum FetchOutcome {
    Downloaded(DownloadResult),
    Skipped,
    Failed(FetchError),
}

/// Downloads the image of `record` and saves it as `filename` in the assets directory.
///
/// Never fails: every error is logged and returned as [`FetchOutcome::Failed`].
/// Waits for the configured delay after each download attempt.
pub async fn fetch<S>(
    session: &mut S,
    record: &Record,
    filename: &str,
    conf: &PipelineConfig,
) -> FetchOutcome
where
    S: Session,
{
    let image_url = match record.image_url.as_deref() {
        Some(url) if !url.is_empty() => url,
        _ => {
            log::info!("No image found for {}", record.name);
            return FetchOutcome::Skipped;
        }
    };

    log::info!("Downloading image for {}...", record.name);
    let res = download(session, image_url, filename, conf).await;
    sleep(conf.fetch_delay()).await;

    match res {
        Ok(byte_size) => {
            log::info!("Downloaded: {filename} ({byte_size} bytes)");
            FetchOutcome::Downloaded(DownloadResult {
                record_name: record.name.clone(),
                filename: filename.to_string(),
                source_url: image_url.to_string(),
                byte_size,
            })
        }
        Err(e @ FetchError::TooSmall { .. }) => {
            log::warn!("Image too small for {}: {e}", record.name);
            FetchOutcome::Failed(e)
        }
        Err(e) => {
            log::error!("Failed to download image for {} got: {e}", record.name);
            FetchOutcome::Failed(e)
        }
    }
}

async fn download<S>(
    session: &mut S,
    image_url: &str,
    filename: &str,
    conf: &PipelineConfig,
) -> Result<usize, FetchError>
where
    S: Session,
{
    let url = Url::parse(image_url).map_err(|source| FetchError::InvalidUrl {
        url: image_url.to_string(),
        source,
    })?;

    let resp = match timeout(conf.fetch_timeout(), session.goto(&url)).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => return Err(FetchError::Navigation(e)),
        Err(_) => return Err(FetchError::Timeout(conf.fetch_timeout())),
    };

    if !resp.is_success() {
        return Err(FetchError::Status(resp.status));
    }

    let size = resp.body.len();
    if size < conf.min_image_size {
        return Err(FetchError::TooSmall {
            size,
            min: conf.min_image_size,
        });
    }

    match resp.content_type.as_deref().map(str::to_ascii_lowercase) {
        Some(ct) if !ct.starts_with(&format!("image/{IMAGE_EXTENSION}")) => {
            log::warn!("Saving {ct} content of {image_url} as .{IMAGE_EXTENSION}: {filename}");
        }
        _ => (),
    }

    fs_err::create_dir_all(&conf.assets_dir)?;
    let path: PathBuf = conf.assets_dir.join(filename);
    fs_err::write(&path, &resp.body)?;

    Ok(size)
}
