use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info};

use super::traits::PageFetcher;
use super::types::ExtractionError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
/// Time given to script-rendered pages after navigation settles.
const RENDER_WAIT: Duration = Duration::from_secs(3);

/// Plain HTTP fetch. Enough for sites that render listing data server-side.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(PAGE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractionError> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExtractionError::Fetch(e.to_string()))?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                return Err(ExtractionError::Blocked)
            }
            status if !status.is_success() => {
                return Err(ExtractionError::Fetch(format!("HTTP {}", status)))
            }
            _ => {}
        }

        response
            .text()
            .await
            .map_err(|e| ExtractionError::Fetch(e.to_string()))
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}

/// Headless Chrome fetch for pages that only fill in listing data from scripts.
/// A browser is launched per request and closed when the request finishes.
pub struct BrowserFetcher;

impl BrowserFetcher {
    fn render(url: &str) -> Result<String> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(PAGE_TIMEOUT);
        tab.set_user_agent(USER_AGENT, None, None)?;

        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        std::thread::sleep(RENDER_WAIT);

        let html = tab
            .evaluate("document.documentElement.outerHTML", false)?
            .value
            .and_then(|value| value.as_str().map(str::to_owned))
            .context("Page returned no HTML")?;

        info!("Rendered {} ({} bytes)", url, html.len());
        Ok(html)
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractionError> {
        let target = url.to_string();

        tokio::task::spawn_blocking(move || Self::render(&target))
            .await
            .map_err(|e| ExtractionError::Fetch(format!("browser task failed: {}", e)))?
            .map_err(|e| ExtractionError::Fetch(format!("{:#}", e)))
    }

    fn fetcher_name(&self) -> &'static str {
        "headless-chrome"
    }
}
