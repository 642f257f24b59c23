use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Expired,
    Removed, // terminal
}

impl ListingStatus {
    pub fn to_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Expired => "expired",
            ListingStatus::Removed => "removed",
        }
    }

    /// Status only moves forward: active -> expired -> removed, or active -> removed.
    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Active, ListingStatus::Expired)
                | (ListingStatus::Active, ListingStatus::Removed)
                | (ListingStatus::Expired, ListingStatus::Removed)
        )
    }

    /// Statuses a listing may be in right before moving to `next`.
    pub fn sources_for(next: ListingStatus) -> Vec<ListingStatus> {
        [ListingStatus::Active, ListingStatus::Expired, ListingStatus::Removed]
            .into_iter()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
pub enum PropertyType {
    #[sqlx(rename = "Single Family")]
    #[serde(rename = "Single Family")]
    SingleFamily,
    Condo,
    Townhouse,
    #[sqlx(rename = "Multi-Family")]
    #[serde(rename = "Multi-Family")]
    MultiFamily,
    Commercial,
}

impl PropertyType {
    pub fn to_str(&self) -> &'static str {
        match self {
            PropertyType::SingleFamily => "Single Family",
            PropertyType::Condo => "Condo",
            PropertyType::Townhouse => "Townhouse",
            PropertyType::MultiFamily => "Multi-Family",
            PropertyType::Commercial => "Commercial",
        }
    }

    pub fn parse(value: &str) -> Option<PropertyType> {
        match value.trim() {
            "Single Family" => Some(PropertyType::SingleFamily),
            "Condo" => Some(PropertyType::Condo),
            "Townhouse" => Some(PropertyType::Townhouse),
            "Multi-Family" => Some(PropertyType::MultiFamily),
            "Commercial" => Some(PropertyType::Commercial),
            _ => None,
        }
    }

    /// Residential types must carry bedroom and bathroom counts.
    pub fn is_residential(&self) -> bool {
        !matches!(self, PropertyType::Commercial)
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Listing {
    pub id: i64,

    // Seller
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub private_contact: bool,

    // Property
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub property_type: PropertyType,
    pub price: i64,
    pub sqft: i64,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub year_built: Option<i64>,
    pub lot_size: Option<f64>,
    pub features: String,
    pub description: String,

    // Commercial
    pub building_class: Option<String>,
    pub zoning: Option<String>,
    pub occupancy_rate: Option<f64>,
    pub cap_rate: Option<f64>,
    pub gross_income: Option<i64>,
    pub operating_expenses: Option<i64>,
    pub number_of_units: Option<i64>,
    pub parking_spaces: Option<i64>,
    pub lease_type: Option<String>,

    // Cross-listing
    pub mls_number: Option<String>,
    pub external_url: Option<String>,
    pub listing_source: String,

    // Lifecycle
    pub submission_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub status: ListingStatus,
    pub reminder_sent: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn seller_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn full_address(&self) -> String {
        format!("{}, {}, {} {}", self.address, self.city, self.state, self.zip)
    }

    /// Whole days left before expiry, rounded up, never negative.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let seconds = (self.expiration_date - now).num_seconds();
        if seconds <= 0 {
            return 0;
        }
        (seconds + 86_399) / 86_400
    }
}

/// Everything needed to insert a listing row; dates are already computed.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub private_contact: bool,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub property_type: PropertyType,
    pub price: i64,
    pub sqft: i64,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub year_built: Option<i64>,
    pub lot_size: Option<f64>,
    pub features: String,
    pub description: String,
    pub building_class: Option<String>,
    pub zoning: Option<String>,
    pub occupancy_rate: Option<f64>,
    pub cap_rate: Option<f64>,
    pub gross_income: Option<i64>,
    pub operating_expenses: Option<i64>,
    pub number_of_units: Option<i64>,
    pub parking_spaces: Option<i64>,
    pub lease_type: Option<String>,
    pub mls_number: Option<String>,
    pub external_url: Option<String>,
    pub listing_source: String,
    pub submission_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Photo {
    pub id: i64,
    pub listing_id: i64,
    /// Local filename under the upload dir, or an absolute http(s) URL.
    pub locator: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn is_remote(&self) -> bool {
        is_remote_locator(&self.locator)
    }

    pub fn public_url(&self) -> String {
        if self.is_remote() {
            self.locator.clone()
        } else {
            format!("/api/fsbo/photo/{}", self.locator)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub locator: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub display_order: i64,
}

pub fn is_remote_locator(locator: &str) -> bool {
    let lower = locator.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
