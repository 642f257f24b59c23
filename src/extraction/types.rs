use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

/// The listing site a URL belongs to. Decides which selector strategy runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Zillow,
    Realtor,
    Redfin,
    Trulia,
    Century21,
    Remax,
    ColdwellBanker,
    Compass,
    KellerWilliams,
    Universal,
}

impl SourceKind {
    pub fn detect(url: &str) -> Self {
        let url = url.to_lowercase();

        if url.contains("zillow.com") {
            SourceKind::Zillow
        } else if url.contains("realtor.com") {
            SourceKind::Realtor
        } else if url.contains("redfin.com") {
            SourceKind::Redfin
        } else if url.contains("trulia.com") {
            SourceKind::Trulia
        } else if url.contains("century21.com") {
            SourceKind::Century21
        } else if url.contains("remax.com") {
            SourceKind::Remax
        } else if url.contains("coldwellbanker.com") {
            SourceKind::ColdwellBanker
        } else if url.contains("compass.com") {
            SourceKind::Compass
        } else if url.contains("kw.com") || url.contains("keller") {
            SourceKind::KellerWilliams
        } else {
            SourceKind::Universal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Zillow => "zillow",
            SourceKind::Realtor => "realtor",
            SourceKind::Redfin => "redfin",
            SourceKind::Trulia => "trulia",
            SourceKind::Century21 => "century21",
            SourceKind::Remax => "remax",
            SourceKind::ColdwellBanker => "coldwellbanker",
            SourceKind::Compass => "compass",
            SourceKind::KellerWilliams => "kellerwilliams",
            SourceKind::Universal => "universal",
        }
    }
}

/// Best-effort property fields lifted from a third-party listing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedListing {
    pub source: SourceKind,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub price: Option<i64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<i64>,
    pub description: Option<String>,
    pub images: Vec<String>,
}

impl ExtractedListing {
    pub fn empty(source: SourceKind) -> Self {
        ExtractedListing {
            source,
            address: None,
            city: None,
            state: None,
            zip: None,
            price: None,
            bedrooms: None,
            bathrooms: None,
            sqft: None,
            description: None,
            images: Vec::new(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Invalid listing URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load the listing page: {0}")]
    Fetch(String),

    #[error("Site is blocking automated access. Please try a different listing or enter details manually.")]
    Blocked,

    #[error("Could not extract listing data. The page structure may not be supported.")]
    NoListingData,
}

/// Only absolute http(s) URLs with a host are worth fetching.
pub fn parse_listing_url(raw: &str) -> Result<Url, ExtractionError> {
    let url = Url::parse(raw.trim()).map_err(|e| ExtractionError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractionError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ExtractionError::InvalidUrl("missing host".to_string()));
    }

    Ok(url)
}
