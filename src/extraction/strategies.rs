use super::types::SourceKind;

/// Selectors for each field, tried in order. The first non-empty match wins.
#[derive(Debug, Clone, Copy)]
pub struct SelectorSet {
    pub address: &'static [&'static str],
    pub price: &'static [&'static str],
    pub beds: &'static [&'static str],
    pub baths: &'static [&'static str],
    pub sqft: &'static [&'static str],
    pub description: &'static [&'static str],
}

pub const UNIVERSAL: SelectorSet = SelectorSet {
    address: &[
        "h1.address",
        ".property-address",
        ".listing-address",
        "[itemprop=\"address\"]",
        ".street-address",
        "h1.listing-title",
        "h1[data-testid=\"property-street\"]",
        "h1.property-address",
        ".pdp-address h1",
        "[data-rf-test-id=\"abp-streetLine\"]",
    ],
    price: &[
        ".price",
        ".property-price",
        ".listing-price",
        "[itemprop=\"price\"]",
        ".list-price",
        "span.price",
        "[data-testid=\"price\"]",
        ".price-display",
        "[data-rf-test-id=\"abp-price\"]",
        "span[class*=\"price\"]",
        ".sales-price",
    ],
    beds: &[
        ".beds",
        ".bedrooms",
        "[data-beds]",
        ".beds-count",
        ".bedroom-count",
        "[data-testid=\"bed-count\"]",
        "[data-rf-test-id=\"abp-beds\"]",
        ".property-beds",
        "li[data-testid=\"property-meta-beds\"]",
    ],
    baths: &[
        ".baths",
        ".bathrooms",
        "[data-baths]",
        ".baths-count",
        ".bathroom-count",
        "[data-testid=\"bath-count\"]",
        "[data-rf-test-id=\"abp-baths\"]",
        ".property-baths",
        "li[data-testid=\"property-meta-baths\"]",
    ],
    sqft: &[
        ".sqft",
        ".square-feet",
        "[data-sqft]",
        ".sqft-value",
        ".living-area",
        "[data-testid=\"sqft-value\"]",
        "[data-rf-test-id=\"abp-sqFt\"]",
        ".property-sqft",
        "li[data-testid=\"property-meta-sqft\"]",
    ],
    description: &[
        ".description",
        ".property-description",
        ".listing-description",
        ".remarks",
        ".property-details",
        "[data-testid=\"description\"]",
        ".property-remarks",
        "#listing-description",
    ],
};

const ZILLOW: SelectorSet = SelectorSet {
    address: &["h1[data-testid=\"property-street\"]", ".ds-address-container h1"],
    price: &["[data-testid=\"price\"]", "span[data-testid=\"price\"]"],
    beds: &["[data-testid=\"bed-count\"]"],
    baths: &["[data-testid=\"bath-count\"]"],
    sqft: &["[data-testid=\"sqft-value\"]"],
    description: &["[data-testid=\"description\"]"],
};

const REALTOR: SelectorSet = SelectorSet {
    address: &["[data-testid=\"address\"]", "h1[data-testid=\"address-line\"]"],
    price: &["[data-testid=\"list-price\"]", "[data-testid=\"price\"]"],
    beds: &["li[data-testid=\"property-meta-beds\"]"],
    baths: &["li[data-testid=\"property-meta-baths\"]"],
    sqft: &["li[data-testid=\"property-meta-sqft\"]"],
    description: &["[data-testid=\"romance-paragraph\"]"],
};

const REDFIN: SelectorSet = SelectorSet {
    address: &["[data-rf-test-id=\"abp-streetLine\"]"],
    price: &["[data-rf-test-id=\"abp-price\"]"],
    beds: &["[data-rf-test-id=\"abp-beds\"]"],
    baths: &["[data-rf-test-id=\"abp-baths\"]"],
    sqft: &["[data-rf-test-id=\"abp-sqFt\"]"],
    description: &["#marketing-remarks-scroll", ".remarks"],
};

const TRULIA: SelectorSet = SelectorSet {
    address: &["[data-testid=\"home-details-summary-headline\"]"],
    price: &["[data-testid=\"on-market-price-details\"]"],
    beds: &["[data-testid=\"home-summary-size-bedrooms\"]"],
    baths: &["[data-testid=\"home-summary-size-bathrooms\"]"],
    sqft: &["[data-testid=\"home-summary-size-floorspace\"]"],
    description: &["[data-testid=\"home-description-text-description-text\"]"],
};

const COMPASS: SelectorSet = SelectorSet {
    address: &[".pdp-address h1", "[data-tn=\"listing-page-address\"]"],
    price: &["[data-tn=\"listing-page-summary-price\"]"],
    beds: &["[data-tn=\"listing-page-summary-beds\"]"],
    baths: &["[data-tn=\"listing-page-summary-baths\"]"],
    sqft: &["[data-tn=\"listing-page-summary-sq-ft\"]"],
    description: &["[data-tn=\"listing-page-description\"]"],
};

/// Source-specific selectors, if the site has any beyond the universal ones.
pub fn strategy_for(source: SourceKind) -> Option<&'static SelectorSet> {
    match source {
        SourceKind::Zillow => Some(&ZILLOW),
        SourceKind::Realtor => Some(&REALTOR),
        SourceKind::Redfin => Some(&REDFIN),
        SourceKind::Trulia => Some(&TRULIA),
        SourceKind::Compass => Some(&COMPASS),
        SourceKind::Century21
        | SourceKind::Remax
        | SourceKind::ColdwellBanker
        | SourceKind::KellerWilliams
        | SourceKind::Universal => None,
    }
}

/// Selectors to try for a source, specific ones first, universal fallback last.
pub fn selector_chain(source: SourceKind) -> Vec<&'static SelectorSet> {
    strategy_for(source)
        .into_iter()
        .chain(std::iter::once(&UNIVERSAL))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_every_selector_parses() {
        let sets = [&UNIVERSAL, &ZILLOW, &REALTOR, &REDFIN, &TRULIA, &COMPASS];
        for set in sets {
            for selector in set
                .address
                .iter()
                .chain(set.price)
                .chain(set.beds)
                .chain(set.baths)
                .chain(set.sqft)
                .chain(set.description)
            {
                assert!(Selector::parse(selector).is_ok(), "bad selector {}", selector);
            }
        }
    }

    #[test]
    fn test_universal_always_last() {
        let chain = selector_chain(SourceKind::Redfin);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].address, UNIVERSAL.address);
        assert_eq!(selector_chain(SourceKind::Remax).len(), 1);
    }
}
