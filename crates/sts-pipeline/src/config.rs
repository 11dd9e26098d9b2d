use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// The page holding the table to scrap
    #[serde(default = "default_target_url")]
    pub target_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// CSS selector of the table, the first match is used
    #[serde(default = "default_table_selector")]
    pub table_selector: String,

    /// Session launch timeout in seconds
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: f32,

    /// Target page load timeout in seconds
    #[serde(default = "default_page_timeout")]
    pub page_timeout: f32,

    /// Single image download timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: f32,

    /// The delay in seconds after each image download attempt
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay: f32,

    /// Images smaller than this (in bytes) are discarded
    #[serde(default = "default_min_image_size")]
    pub min_image_size: usize,

    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,

    #[serde(default = "default_on_collision")]
    pub on_collision: OnCollision,

    #[serde(default = "default_slug_special_cases")]
    pub slug_special_cases: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            user_agent: default_user_agent(),
            table_selector: default_table_selector(),
            startup_timeout: default_startup_timeout(),
            page_timeout: default_page_timeout(),
            fetch_timeout: default_fetch_timeout(),
            fetch_delay: default_fetch_delay(),
            min_image_size: default_min_image_size(),
            assets_dir: default_assets_dir(),
            manifest_file: default_manifest_file(),
            on_collision: default_on_collision(),
            slug_special_cases: default_slug_special_cases(),
        }
    }
}

fn default_target_url() -> String {
    String::from("https://l2.watch/")
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    )
}

fn default_table_selector() -> String {
    String::from("table")
}

fn default_startup_timeout() -> f32 {
    60.
}

fn default_page_timeout() -> f32 {
    30.
}

fn default_fetch_timeout() -> f32 {
    10.
}

fn default_fetch_delay() -> f32 {
    1.
}

fn default_min_image_size() -> usize {
    1024
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("src/assets/data/img")
}

fn default_manifest_file() -> PathBuf {
    PathBuf::from("scraping-results.json")
}

fn default_on_collision() -> OnCollision {
    OnCollision::Overwrite
}

fn default_slug_special_cases() -> BTreeMap<String, String> {
    [("RGB++", "rgb-plus-plus"), ("RGB", "rgb"), ("BRC-20", "brc-20")]
        .into_iter()
        .map(|(name, slug)| (name.to_string(), slug.to_string()))
        .collect()
}

/// What to do when two records sanitize to the same image filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnCollision {
    /// Last writer wins, a warning is logged
    Overwrite,
    /// Later records get a `-2`, `-3`, ... suffix
    Suffix,
}

impl PipelineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.target_url()?;
        self.table_selector()?;

        for (name, secs) in [
            ("startupTimeout", self.startup_timeout),
            ("pageTimeout", self.page_timeout),
            ("fetchTimeout", self.fetch_timeout),
        ] {
            match Duration::try_from_secs_f32(secs) {
                Ok(d) if !d.is_zero() => (),
                _ => bail!(
                    "Invalid config, `{name}` must be a positive number of seconds, got: {secs}"
                ),
            }
        }
        if let Err(e) = Duration::try_from_secs_f32(self.fetch_delay) {
            bail!(
                "Invalid config, `fetchDelay` must be a non-negative number of seconds, got: {} ({e})",
                self.fetch_delay
            );
        }
        if self.manifest_file.as_os_str().is_empty() {
            bail!("Invalid config, `manifestFile` is empty");
        }

        Ok(())
    }

    pub fn target_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.target_url)
            .map_err(|e| anyhow!("Invalid target URL {:?} got: {e}", self.target_url))
    }

    pub fn table_selector(&self) -> anyhow::Result<Selector> {
        Selector::parse(&self.table_selector)
            .map_err(|e| anyhow!("Invalid table selector {:?} got: {e}", self.table_selector))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.startup_timeout)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.page_timeout)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.fetch_timeout)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_secs_f32(self.fetch_delay)
    }
}
