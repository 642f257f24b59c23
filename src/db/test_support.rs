use chrono::{DateTime, Duration, Utc};

use super::db::DBClient;
use crate::models::listingmodel::{NewListing, PropertyType};

pub async fn memory_client() -> DBClient {
    DBClient::in_memory().await.expect("in-memory database opens")
}

/// File-backed database with a multi-connection pool, for tests that need real concurrency.
pub async fn file_client(dir: &std::path::Path, max_connections: u32) -> DBClient {
    let url = format!("sqlite://{}", dir.join("fsbo-test.db").display());
    DBClient::connect(&url, max_connections)
        .await
        .expect("file database opens")
}

pub fn residential_listing(submitted_at: DateTime<Utc>, duration_days: i64) -> NewListing {
    NewListing {
        first_name: "John".to_string(),
        last_name: "Smith".to_string(),
        email: "john.smith@example.com".to_string(),
        phone: "(206) 555-1234".to_string(),
        private_contact: false,
        address: "123 Maple Street".to_string(),
        city: "Seattle".to_string(),
        state: "WA".to_string(),
        zip: "98101".to_string(),
        property_type: PropertyType::SingleFamily,
        price: 750_000,
        sqft: 2_800,
        bedrooms: Some(4),
        bathrooms: Some(2.5),
        year_built: Some(2010),
        lot_size: Some(0.25),
        features: "Hardwood floors, Updated kitchen".to_string(),
        description: "Beautiful 4-bedroom home in the heart of Seattle.".to_string(),
        building_class: None,
        zoning: None,
        occupancy_rate: None,
        cap_rate: None,
        gross_income: None,
        operating_expenses: None,
        number_of_units: None,
        parking_spaces: None,
        lease_type: None,
        mls_number: None,
        external_url: None,
        listing_source: "fsbo".to_string(),
        submission_date: submitted_at,
        expiration_date: submitted_at + Duration::days(duration_days),
    }
}

pub fn commercial_listing(submitted_at: DateTime<Utc>, duration_days: i64) -> NewListing {
    NewListing {
        property_type: PropertyType::Commercial,
        bedrooms: None,
        bathrooms: None,
        building_class: Some("B".to_string()),
        zoning: Some("C-2".to_string()),
        occupancy_rate: Some(92.5),
        cap_rate: Some(6.8),
        gross_income: Some(420_000),
        number_of_units: Some(12),
        parking_spaces: Some(30),
        lease_type: Some("NNN".to_string()),
        ..residential_listing(submitted_at, duration_days)
    }
}
