use async_trait::async_trait;
use reqwest::Url;

use super::types::ExtractionError;

/// Loads the HTML of a listing page. New ways of fetching (plain HTTP,
/// a real browser) plug in here without touching the parsing side.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractionError>;

    fn fetcher_name(&self) -> &'static str;
}
