#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scraper::{Html, Selector};
use sts_pipeline::{PipelineConfig, Response, Session};
use tokio::time::Instant;
use url::Url;

pub const TARGET: &str = "https://tables.test/";

#[derive(Debug, Clone)]
pub enum Route {
    Ok {
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// An html page whose scripts swap `shell` for `html` after a while
    Rendered {
        shell: String,
        html: String,
        after: Duration,
    },
    Status(u16),
    Fail(&'static str),
    Hang,
}

/// Scripted responses shared by every session launched from it
#[derive(Debug, Clone, Default)]
pub struct FakeWeb {
    routes: HashMap<String, Route>,
    fail_launch: bool,
    pub launches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub visits: Arc<Mutex<Vec<String>>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.route(
            url,
            Route::Ok {
                content_type: "text/html; charset=utf-8",
                body: html.as_bytes().to_vec(),
            },
        )
    }

    pub fn image(self, url: &str, content_type: &'static str, size: usize) -> Self {
        self.route(
            url,
            Route::Ok {
                content_type,
                body: vec![0x89; size],
            },
        )
    }

    pub fn rendered_page(self, url: &str, shell: &str, html: &str, after: Duration) -> Self {
        self.route(
            url,
            Route::Rendered {
                shell: shell.to_string(),
                html: html.to_string(),
                after,
            },
        )
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

/// Emulates a browser tab: `wait_for` polls the current document
pub struct FakeSession {
    web: FakeWeb,
    document: String,
    rendered: Option<(Instant, String)>,
}

impl FakeSession {
    fn current_document(&self) -> &str {
        match &self.rendered {
            Some((at, html)) if Instant::now() >= *at => html,
            _ => &self.document,
        }
    }
}

impl Session for FakeSession {
    type Config = FakeWeb;

    async fn launch(web: &FakeWeb, _conf: &PipelineConfig) -> anyhow::Result<Self> {
        if web.fail_launch {
            anyhow::bail!("browser not found");
        }
        web.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            web: web.clone(),
            document: String::new(),
            rendered: None,
        })
    }

    async fn goto(&mut self, url: &Url) -> anyhow::Result<Response> {
        self.web.visits.lock().unwrap().push(url.to_string());

        self.rendered = None;
        let (status, content_type, body) = match self.web.routes.get(url.as_str()).cloned() {
            Some(Route::Ok { content_type, body }) => (200, Some(content_type.to_string()), body),
            Some(Route::Rendered { shell, html, after }) => {
                self.rendered = Some((Instant::now() + after, html));
                (200, Some("text/html".to_string()), shell.into_bytes())
            }
            Some(Route::Status(status)) => (status, None, vec![]),
            Some(Route::Fail(reason)) => anyhow::bail!("net::{reason}"),
            Some(Route::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::bail!("still hanging")
            }
            None => (404, None, vec![]),
        };

        self.document = String::from_utf8_lossy(&body).into_owned();

        Ok(Response {
            url: url.clone(),
            status,
            content_type,
            body,
        })
    }

    async fn wait_for(&mut self, selector: &str) -> anyhow::Result<String> {
        let selector = Selector::parse(selector).map_err(|e| anyhow::anyhow!("{e}"))?;
        loop {
            let document = self.current_document().to_string();
            if Html::parse_document(&document).select(&selector).next().is_some() {
                return Ok(document);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn close(self) -> anyhow::Result<()> {
        self.web.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        target_url: TARGET.to_string(),
        fetch_delay: 0.,
        fetch_timeout: 0.2,
        page_timeout: 0.2,
        assets_dir: dir.join("img"),
        manifest_file: dir.join("out").join("results.json"),
        ..Default::default()
    }
}

pub fn row(cells: &[&str]) -> String {
    let cells = cells
        .iter()
        .map(|c| format!("<td>{c}</td>"))
        .collect::<String>();
    format!("<tr>{cells}</tr>")
}

pub fn table_page(rows: &[String]) -> String {
    format!(
        "<html><head><title>Listing</title></head><body>\
         <table><thead><tr><th>Name</th><th>Logo</th></tr></thead>\
         <tbody>{}</tbody></table></body></html>",
        rows.concat()
    )
}
