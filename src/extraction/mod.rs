pub mod fetcher;
pub mod parse;
pub mod strategies;
pub mod traits;
pub mod types;

use std::sync::Arc;

use tracing::{error, info};

use self::parse::parse_listing_page;
use self::traits::PageFetcher;
use self::types::{parse_listing_url, ExtractedListing, ExtractionError, SourceKind};

/// Pre-fills a submission form from a third-party listing URL. Works on
/// fetched HTML only and never writes anywhere.
pub struct ListingExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl ListingExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn extract(&self, url: &str) -> Result<ExtractedListing, ExtractionError> {
        info!("Starting extraction for: {}", url);

        let result = self.try_extract(url).await;
        if let Err(e) = &result {
            error!("Extraction failed for {}: {}", url, e);
        }
        result
    }

    async fn try_extract(&self, url: &str) -> Result<ExtractedListing, ExtractionError> {
        let page_url = parse_listing_url(url)?;
        let source = SourceKind::detect(page_url.as_str());
        info!(
            "Detected source: {} (fetching with {})",
            source.as_str(),
            self.fetcher.fetcher_name()
        );

        let html = self.fetcher.fetch(&page_url).await?;
        let listing = parse_listing_page(&html, &page_url, source)?;

        info!(
            "Extracted listing: address={:?}, price={:?}, images={}",
            listing.address,
            listing.price,
            listing.images.len()
        );
        Ok(listing)
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::Url;

    use super::traits::PageFetcher;
    use super::types::ExtractionError;

    /// Serves one canned page and remembers what was asked for.
    pub struct StaticFetcher {
        pub html: Result<String, ExtractionError>,
        pub requested: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn serving(html: &str) -> Self {
            Self {
                html: Ok(html.to_string()),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(error: ExtractionError) -> Self {
            Self {
                html: Err(error),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, ExtractionError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.html.clone()
        }

        fn fetcher_name(&self) -> &'static str {
            "static"
        }
    }
}
