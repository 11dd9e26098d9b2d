use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::extract::Record;
use crate::fetcher::{DownloadResult, FailedDownload};

/// Summary of a pipeline run, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(serialize_with = "to_iso8601", deserialize_with = "from_iso8601")]
    pub scraped_at: DateTime<Utc>,
    pub total_protocols: usize,
    pub images_downloaded: usize,
    pub protocols: Vec<Record>,
    pub downloaded_images: Vec<DownloadResult>,
    #[serde(default)]
    pub failed_downloads: Vec<FailedDownload>,
}

impl Manifest {
    pub fn new(
        protocols: Vec<Record>,
        downloaded_images: Vec<DownloadResult>,
        failed_downloads: Vec<FailedDownload>,
    ) -> Self {
        Self {
            scraped_at: Utc::now().trunc_subsecs(3),
            total_protocols: protocols.len(),
            images_downloaded: downloaded_images.len(),
            protocols,
            downloaded_images,
            failed_downloads,
        }
    }

    /// Writes the manifest, replacing any previous file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs_err::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs_err::write(path, json)?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs_err::read_to_string(path)?;
        serde_json::from_str(&json)
            .with_context(|| format!("Couldn't parse manifest {}", path.display()))
    }

    pub fn download_for(&self, record_name: &str) -> Option<&DownloadResult> {
        self.downloaded_images
            .iter()
            .find(|dl| dl.record_name == record_name)
    }
}

fn to_iso8601<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn from_iso8601<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|date| date.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
