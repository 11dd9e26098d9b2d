use std::future::Future;

use anyhow::{anyhow, bail, Context};
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use url::Url;

use crate::config::PipelineConfig;

/// A navigable browsing context, owned by one pipeline run.
///
/// Every `goto` replaces the current document, so a session must never be
/// shared between concurrent navigations.
pub trait Session: Sized {
    type Config: Clone;

    fn launch(
        session_conf: &Self::Config,
        conf: &PipelineConfig,
    ) -> impl Future<Output = anyhow::Result<Self>>;

    /// Navigates to `url` and returns the main response
    fn goto(&mut self, url: &Url) -> impl Future<Output = anyhow::Result<Response>>;

    /// Waits until an element of the current document matches `selector`
    /// and returns the document HTML at that point.
    ///
    /// Callers bound the wait with a timeout.
    fn wait_for(&mut self, selector: &str) -> impl Future<Output = anyhow::Result<String>>;

    fn close(self) -> impl Future<Output = anyhow::Result<()>>;
}

#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    /// Left empty when `status` is not a success
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Plain HTTP session, the current document is the last fetched response.
///
/// Scripts are not run, so `wait_for` only sees what the server sent.
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    current: Option<Url>,
    document: String,
}

impl HttpSession {
    pub fn current_url(&self) -> Option<&Url> {
        self.current.as_ref()
    }
}

impl Session for HttpSession {
    type Config = ();

    async fn launch(_session_conf: &(), conf: &PipelineConfig) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(&conf.user_agent)
            .gzip(true)
            .deflate(true)
            .build()
            .context("Couldn't build HTTP client")?;

        Ok(Self {
            client,
            current: None,
            document: String::new(),
        })
    }

    async fn goto(&mut self, url: &Url) -> anyhow::Result<Response> {
        let resp = self.client.get(url.clone()).send().await?;

        let final_url = resp.url().clone();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|c| c.to_str().ok())
            .map(str::to_string);
        self.current = Some(final_url.clone());

        let body = if status.is_success() {
            resp.bytes().await?.to_vec()
        } else {
            vec![]
        };
        self.document = String::from_utf8_lossy(&body).into_owned();

        Ok(Response {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }

    async fn wait_for(&mut self, selector: &str) -> anyhow::Result<String> {
        let parsed =
            Selector::parse(selector).map_err(|e| anyhow!("Invalid selector {selector:?} got: {e}"))?;

        // a static document will not change, no point in polling it
        if Html::parse_document(&self.document).select(&parsed).next().is_none() {
            bail!("no element matches {selector:?} in the served document");
        }
        Ok(self.document.clone())
    }

    async fn close(self) -> anyhow::Result<()> {
        log::debug!("Closing HTTP session (last page: {:?})", self.current);
        Ok(())
    }
}
