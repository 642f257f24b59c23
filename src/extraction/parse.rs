use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use super::strategies::{selector_chain, SelectorSet};
use super::types::{ExtractedListing, ExtractionError, SourceKind};

pub const MAX_IMAGES: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
/// Images declaring a width at or below this are thumbnails or badges.
const MIN_IMAGE_WIDTH: u32 = 200;

const BLOCKED_PHRASES: [&str; 3] = ["verify you are a human", "security check", "access denied"];

static CITY_STATE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",\s*([^,]+),\s*([A-Z]{2})\s*(\d{5})").expect("address regex is valid")
});
static WHOLE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("number regex is valid"));
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\d*").expect("decimal regex is valid"));

/// Turns a fetched listing page into structured fields.
pub fn parse_listing_page(
    html: &str,
    page_url: &Url,
    source: SourceKind,
) -> Result<ExtractedListing, ExtractionError> {
    let document = Html::parse_document(html);

    if is_blocked(&document) {
        return Err(ExtractionError::Blocked);
    }

    let chain = selector_chain(source);
    let field = |pick: fn(&SelectorSet) -> &'static [&'static str]| {
        chain
            .iter()
            .find_map(|set| first_text(&document, pick(set)))
    };

    let mut listing = ExtractedListing::empty(source);

    if let Some(address) = field(|s| s.address) {
        if let Some(caps) = CITY_STATE_ZIP_RE.captures(&address) {
            listing.city = Some(caps[1].trim().to_string());
            listing.state = Some(caps[2].to_string());
            listing.zip = Some(caps[3].to_string());
        }
        listing.address = Some(address);
    }

    listing.price = field(|s| s.price).and_then(|t| whole_number(&t));
    listing.bedrooms = field(|s| s.beds).and_then(|t| decimal(&t));
    listing.bathrooms = field(|s| s.baths).and_then(|t| decimal(&t));
    listing.sqft = field(|s| s.sqft).and_then(|t| whole_number(&t));
    listing.description = field(|s| s.description)
        .map(|t| t.chars().take(MAX_DESCRIPTION_CHARS).collect());
    listing.images = collect_images(&document, page_url);

    if listing.address.is_none() && listing.price.is_none() {
        return Err(ExtractionError::NoListingData);
    }

    Ok(listing)
}

fn is_blocked(document: &Html) -> bool {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let text = body.text().collect::<String>().to_lowercase();
    BLOCKED_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// Text of the first element matching any selector, whitespace collapsed.
fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .map(|element| collapse_text(&element))
                .find(|text| !text.is_empty())
        })
}

fn collapse_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn whole_number(text: &str) -> Option<i64> {
    WHOLE_NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

fn decimal(text: &str) -> Option<f64> {
    DECIMAL_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

fn collect_images(document: &Html, page_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for img in document.select(&selector) {
        let element = img.value();
        let Some(raw) = image_source(&img) else {
            continue;
        };
        let Ok(resolved) = page_url.join(&raw) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let src = resolved.to_string();
        let alt = element.attr("alt").unwrap_or_default().to_lowercase();
        let lower = src.to_lowercase();
        let is_logo = lower.contains("logo")
            || lower.contains("icon")
            || alt.contains("logo")
            || alt.contains("icon");
        let width: u32 = element
            .attr("width")
            .and_then(|w| w.trim().parse().ok())
            .unwrap_or(0);

        if is_logo || (width != 0 && width <= MIN_IMAGE_WIDTH) {
            continue;
        }
        if seen.insert(src.clone()) {
            images.push(src);
            if images.len() == MAX_IMAGES {
                break;
            }
        }
    }

    images
}

/// `src`, then the lazy-loading attributes, then the last `srcset` candidate.
fn image_source(img: &ElementRef) -> Option<String> {
    let element = img.value();
    ["src", "data-src", "data-lazy", "data-original"]
        .iter()
        .filter_map(|attr| element.attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            element
                .attr("srcset")?
                .split(',')
                .filter_map(|candidate| candidate.split_whitespace().next())
                .last()
                .map(str::to_owned)
        })
}
