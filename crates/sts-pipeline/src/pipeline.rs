use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Context};
use scraper::Html;
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::{OnCollision, PipelineConfig};
use crate::extract::{extract_html, Record};
use crate::fetcher::{fetch, FailedDownload, FetchOutcome};
use crate::manifest::Manifest;
use crate::sanitize::{sanitize, with_suffix};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    PageLoaded,
    Extracted,
    Fetching(usize),
    ManifestWritten,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::PageLoaded => write!(f, "page load"),
            Self::Extracted => write!(f, "extraction"),
            Self::Fetching(i) => write!(f, "fetching #{i}"),
            Self::ManifestWritten => write!(f, "manifest"),
            Self::Closed => write!(f, "close"),
        }
    }
}

/// Loads the target page, extracts its table records, downloads their images
/// one after the other and writes the manifest.
///
/// Only a failure to launch the session, to load the page or to write the
/// manifest is an error, image download failures end up in the manifest.
pub async fn run_pipeline<S>(
    conf: &PipelineConfig,
    session_conf: &S::Config,
) -> anyhow::Result<Manifest>
where
    S: Session,
{
    conf.validate()?;

    log::info!("Starting session");
    let mut session = match timeout(conf.startup_timeout(), S::launch(session_conf, conf)).await {
        Ok(session) => session.with_context(|| format!("Failed during {}", Phase::Init))?,
        Err(_) => bail!(
            "Failed during {}: session launch timed out after {:?}",
            Phase::Init,
            conf.startup_timeout()
        ),
    };

    let res = scrap(&mut session, conf).await;

    log::debug!("Entering {}", Phase::Closed);
    if let Err(e) = session.close().await {
        log::warn!("Couldn't close session got: {e:#}");
    }

    res
}

async fn scrap<S>(session: &mut S, conf: &PipelineConfig) -> anyhow::Result<Manifest>
where
    S: Session,
{
    let target_url = conf.target_url()?;
    let table = conf.table_selector()?;

    log::info!("Loading {target_url}");
    let deadline = Instant::now() + conf.page_timeout();
    let page = match timeout_at(deadline, session.goto(&target_url)).await {
        Ok(page) => page.with_context(|| format!("Failed during {}", Phase::PageLoaded))?,
        Err(_) => bail!(
            "Failed during {}: {target_url} timed out after {:?}",
            Phase::PageLoaded,
            conf.page_timeout()
        ),
    };
    if !page.is_success() {
        bail!(
            "Failed during {}: {target_url} got HTTP error {}",
            Phase::PageLoaded,
            page.status
        );
    }

    log::debug!("Waiting for {:?}", conf.table_selector);
    let document = match timeout_at(deadline, session.wait_for(&conf.table_selector)).await {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => bail!("Failed during {}: {e:#}", Phase::PageLoaded),
        Err(_) => bail!(
            "Failed during {}: no element matches {:?} in {target_url} after {:?}",
            Phase::PageLoaded,
            conf.table_selector,
            conf.page_timeout()
        ),
    };

    log::debug!("Entering {}", Phase::Extracted);
    let records = extract_html(&Html::parse_document(&document), Some(&page.url), &table);
    log::info!("Found {} records", records.len());

    let mut downloads = vec![];
    let mut failures = vec![];
    let mut filenames = Filenames::new(conf.on_collision);
    for (i, record) in records.iter().enumerate() {
        log::debug!("Entering {}", Phase::Fetching(i));
        let filename = filenames.assign(record);
        match fetch(session, record, &filename, conf).await {
            FetchOutcome::Downloaded(dl) => {
                filenames.commit(&dl.filename, &dl.record_name);
                downloads.push(dl)
            }
            FetchOutcome::Skipped => (),
            FetchOutcome::Failed(e) => failures.push(FailedDownload {
                record_name: record.name.clone(),
                source_url: record.image_url.clone().unwrap_or_default(),
                error: e.to_string(),
            }),
        }
    }

    log::info!(
        "Downloaded {} valid images to {}",
        downloads.len(),
        conf.assets_dir.display()
    );

    let manifest = Manifest::new(records, downloads, failures);
    manifest
        .write(&conf.manifest_file)
        .with_context(|| format!("Failed during {}", Phase::ManifestWritten))?;
    log::info!("Results saved to: {}", conf.manifest_file.display());

    Ok(manifest)
}

/// Assigns image filenames to records according to the collision policy.
///
/// Only downloaded images hold their filename, a failed download leaves it free.
struct Filenames {
    on_collision: OnCollision,
    written: HashMap<String, String>,
}

impl Filenames {
    fn new(on_collision: OnCollision) -> Self {
        Self {
            on_collision,
            written: HashMap::new(),
        }
    }

    fn assign(&self, record: &Record) -> String {
        let filename = sanitize(&record.name);
        if self.on_collision == OnCollision::Overwrite {
            return filename;
        }

        let mut candidate = filename.clone();
        let mut n = 2;
        while self.written.contains_key(&candidate) {
            candidate = with_suffix(&filename, n);
            n += 1;
        }
        candidate
    }

    fn commit(&mut self, filename: &str, record_name: &str) {
        if let Some(previous) = self
            .written
            .insert(filename.to_string(), record_name.to_string())
        {
            log::warn!("Image {filename} of {record_name} overwrote the one of {previous}");
        }
    }
}
