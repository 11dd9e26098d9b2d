#[cfg(feature = "browser")]
mod browser;
mod config;
mod extract;
mod fetcher;
mod manifest;
mod pipeline;
mod sanitize;
mod session;
mod slug;

#[cfg(feature = "browser")]
pub use browser::{BrowserSession, BrowserSessionConfig};
pub use config::{OnCollision, PipelineConfig};
pub use extract::{extract, extract_html, has_table, LoadedPage, Record};
pub use fetcher::{fetch, DownloadResult, FailedDownload, FetchError, FetchOutcome};
pub use manifest::Manifest;
pub use pipeline::{run_pipeline, Phase};
pub use sanitize::{sanitize, with_suffix, IMAGE_EXTENSION};
pub use session::{HttpSession, Response, Session};
pub use slug::Slugger;

pub use anyhow;
