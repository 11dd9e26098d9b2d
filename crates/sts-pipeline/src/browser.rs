use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::GetResponseBodyParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

use crate::config::PipelineConfig;
use crate::session::{Response, Session};

/// Interval between two lookups of a selector in the rendered page
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSessionConfig {
    /// Show the browser window
    #[serde(default)]
    pub with_head: bool,

    /// Chrome executable, looked up by chromiumoxide when unset
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Additional Chrome arguments
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

/// Headless Chrome driven over the DevTools protocol, with a single tab
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
}

impl Session for BrowserSession {
    type Config = BrowserSessionConfig;

    async fn launch(session_conf: &BrowserSessionConfig, conf: &PipelineConfig) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-first-run");
        if session_conf.with_head {
            builder = builder.with_head();
        }
        if let Some(path) = &session_conf.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        for arg in &session_conf.chrome_args {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Invalid browser config got: {e}"))?;

        log::info!("Launching browser (headless={})", !session_conf.with_head);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Couldn't launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.set_user_agent(SetUserAgentOverrideParams::new(conf.user_agent.clone()))
            .await?;

        Ok(Self {
            browser,
            handler,
            page,
        })
    }

    async fn goto(&mut self, url: &Url) -> anyhow::Result<Response> {
        self.page.goto(url.as_str()).await?;

        let request = self
            .page
            .wait_for_navigation_response()
            .await?
            .ok_or_else(|| anyhow!("No response for {url}"))?;
        let resp = request
            .response
            .as_ref()
            .ok_or_else(|| anyhow!("No response for {url}"))?;

        let status = u16::try_from(resp.status).unwrap_or(0);
        let final_url = Url::parse(&resp.url).unwrap_or_else(|_| url.clone());

        let body = match (&request.request_id, (200..300).contains(&status)) {
            (Some(request_id), true) => {
                let body = self
                    .page
                    .execute(GetResponseBodyParams::new(request_id.clone()))
                    .await?
                    .result;
                if body.base64_encoded {
                    base64::engine::general_purpose::STANDARD.decode(body.body)?
                } else {
                    body.body.into_bytes()
                }
            }
            _ => vec![],
        };

        Ok(Response {
            url: final_url,
            status,
            content_type: Some(resp.mime_type.clone()),
            body,
        })
    }

    async fn wait_for(&mut self, selector: &str) -> anyhow::Result<String> {
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(self.page.content().await?),
                Err(e) => log::debug!("Waiting for {selector:?}: {e}"),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(mut self) -> anyhow::Result<()> {
        let res = self.browser.close().await;
        self.browser.wait().await.ok();
        self.handler.abort();
        res.context("Couldn't close browser")?;
        Ok(())
    }
}
