use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::listingmodel::{Listing, ListingStatus, Photo, PropertyType};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

pub fn validate_email_address(value: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

/// Listing submission as it arrives from the form, before required-field checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingDto {
    #[validate(length(max = 100, message = "First name is too long"))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "Last name is too long"))]
    pub last_name: Option<String>,
    #[validate(custom = "validate_email_address")]
    pub email: Option<String>,
    #[validate(length(max = 40, message = "Phone number is too long"))]
    pub phone: Option<String>,
    pub private_contact: bool,

    #[validate(length(max = 300, message = "Address is too long"))]
    pub address: Option<String>,
    pub city: Option<String>,
    #[validate(length(equal = 2, message = "State must be a two-letter code"))]
    pub state: Option<String>,
    #[validate(length(min = 5, max = 10, message = "Zip code must be 5 to 10 characters"))]
    pub zip: Option<String>,
    pub property_type: Option<String>,
    #[validate(range(min = 1, message = "Price must be positive"))]
    pub price: Option<i64>,
    #[validate(range(min = 1, message = "Square footage must be positive"))]
    pub sqft: Option<i64>,
    #[validate(range(min = 0, max = 100, message = "Bedrooms must be between 0 and 100"))]
    pub bedrooms: Option<i64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Bathrooms must be between 0 and 100"))]
    pub bathrooms: Option<f64>,
    pub year_built: Option<i64>,
    pub lot_size: Option<f64>,
    pub features: Option<String>,
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    pub building_class: Option<String>,
    pub zoning: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Occupancy rate is a percentage"))]
    pub occupancy_rate: Option<f64>,
    pub cap_rate: Option<f64>,
    pub gross_income: Option<i64>,
    pub operating_expenses: Option<i64>,
    pub number_of_units: Option<i64>,
    pub parking_spaces: Option<i64>,
    pub lease_type: Option<String>,

    pub mls_number: Option<String>,
    pub external_url: Option<String>,
    pub listing_source: Option<String>,

    /// Pre-extracted remote photos, appended after uploaded files.
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl CreateListingDto {
    /// Builds the DTO from multipart text fields. Empty strings count as absent.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, String> {
        let text = |key: &str| -> Option<String> {
            fields
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let photo_urls = match text("photoUrls") {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|_| "photoUrls must be a JSON array of URLs".to_string())?,
            None => Vec::new(),
        };

        Ok(CreateListingDto {
            first_name: text("firstName"),
            last_name: text("lastName"),
            email: text("email"),
            phone: text("phone"),
            private_contact: matches!(text("privateContact").as_deref(), Some("true") | Some("on")),
            address: text("address"),
            city: text("city"),
            state: text("state"),
            zip: text("zip"),
            property_type: text("propertyType"),
            price: parse_number(fields, "price")?,
            sqft: parse_number(fields, "sqft")?,
            bedrooms: parse_number(fields, "bedrooms")?,
            bathrooms: parse_number(fields, "bathrooms")?,
            year_built: parse_number(fields, "yearBuilt")?,
            lot_size: parse_number(fields, "lotSize")?,
            features: text("features"),
            description: text("description"),
            building_class: text("buildingClass"),
            zoning: text("zoning"),
            occupancy_rate: parse_number(fields, "occupancyRate")?,
            cap_rate: parse_number(fields, "capRate")?,
            gross_income: parse_number(fields, "grossIncome")?,
            operating_expenses: parse_number(fields, "operatingExpenses")?,
            number_of_units: parse_number(fields, "numberOfUnits")?,
            parking_spaces: parse_number(fields, "parkingSpaces")?,
            lease_type: text("leaseType"),
            mls_number: text("mlsNumber"),
            external_url: text("externalUrl"),
            listing_source: text("listingSource"),
            photo_urls,
        })
    }

    /// Names of universally required fields that are absent.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let checks: [(&'static str, bool); 11] = [
            ("firstName", self.first_name.is_some()),
            ("lastName", self.last_name.is_some()),
            ("email", self.email.is_some()),
            ("phone", self.phone.is_some()),
            ("address", self.address.is_some()),
            ("city", self.city.is_some()),
            ("zip", self.zip.is_some()),
            ("propertyType", self.property_type.is_some()),
            ("price", self.price.is_some()),
            ("sqft", self.sqft.is_some()),
            ("description", self.description.is_some()),
        ];
        for (name, present) in checks {
            if !present {
                missing.push(name);
            }
        }
        missing
    }
}

fn parse_number<T: std::str::FromStr>(
    fields: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, String> {
    match fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .replace(',', "")
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{} must be a number", key)),
        None => Ok(None),
    }
}

/// A file received in the `photos` multipart field, not yet written to disk.
#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Who is reading a listing. Only admins see private seller contact details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Public,
    Admin,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDto {
    pub id: i64,
    pub filename: String,
    pub url: String,
    pub display_order: i64,
}

impl PhotoDto {
    pub fn from_photo(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            filename: photo.original_name.clone(),
            url: photo.public_url(),
            display_order: photo.display_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponseDto {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
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
    pub status: ListingStatus,
    pub photos: Vec<PhotoDto>,
}

impl ListingResponseDto {
    pub fn from_listing(listing: &Listing, photos: &[Photo], viewer: Viewer) -> Self {
        let hide_contact = listing.private_contact && viewer != Viewer::Admin;
        Self {
            id: listing.id,
            first_name: listing.first_name.clone(),
            last_name: listing.last_name.clone(),
            email: (!hide_contact).then(|| listing.email.clone()),
            phone: (!hide_contact).then(|| listing.phone.clone()),
            private_contact: listing.private_contact,
            address: listing.address.clone(),
            city: listing.city.clone(),
            state: listing.state.clone(),
            zip: listing.zip.clone(),
            property_type: listing.property_type,
            price: listing.price,
            sqft: listing.sqft,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            year_built: listing.year_built,
            lot_size: listing.lot_size,
            features: listing.features.clone(),
            description: listing.description.clone(),
            building_class: listing.building_class.clone(),
            zoning: listing.zoning.clone(),
            occupancy_rate: listing.occupancy_rate,
            cap_rate: listing.cap_rate,
            gross_income: listing.gross_income,
            operating_expenses: listing.operating_expenses,
            number_of_units: listing.number_of_units,
            parking_spaces: listing.parking_spaces,
            lease_type: listing.lease_type.clone(),
            mls_number: listing.mls_number.clone(),
            external_url: listing.external_url.clone(),
            listing_source: listing.listing_source.clone(),
            submission_date: listing.submission_date,
            expiration_date: listing.expiration_date,
            status: listing.status,
            photos: photos.iter().map(PhotoDto::from_photo).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceiptDto {
    pub listing_id: i64,
    pub expiration_date: DateTime<Utc>,
}

/// Website contact form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactFormDto {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(custom = "validate_email_address")]
    pub email: String,
    pub phone: Option<String>,
    pub interest: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    pub message: String,
}

/// Payload handed to the notification gateway for a contact form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactNotice {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub interest: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

impl ContactNotice {
    pub fn from_form(form: ContactFormDto, submitted_at: DateTime<Utc>) -> Self {
        let or_default = |value: Option<String>, default: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            phone: or_default(form.phone, "Not provided"),
            interest: or_default(form.interest, "General Inquiry"),
            message: form.message,
            submitted_at,
        }
    }
}

/// Buyer inquiry forwarded to the seller of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SellerInquiryDto {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(custom = "validate_email_address")]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtractRequestDto {
    #[validate(url(message = "A valid listing URL is required"))]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_form_parses_numbers_and_flags() {
        let dto = CreateListingDto::from_form(&form(&[
            ("firstName", "John"),
            ("price", "750,000"),
            ("bathrooms", "2.5"),
            ("privateContact", "on"),
            ("bedrooms", ""),
            ("photoUrls", r#"["https://img.example.com/1.jpg"]"#),
        ]))
        .unwrap();

        assert_eq!(dto.first_name.as_deref(), Some("John"));
        assert_eq!(dto.price, Some(750_000));
        assert_eq!(dto.bathrooms, Some(2.5));
        assert_eq!(dto.bedrooms, None);
        assert!(dto.private_contact);
        assert_eq!(dto.photo_urls, vec!["https://img.example.com/1.jpg".to_string()]);
    }

    #[test]
    fn test_from_form_rejects_bad_numbers() {
        let err = CreateListingDto::from_form(&form(&[("sqft", "big")])).unwrap_err();
        assert!(err.contains("sqft"));

        let err = CreateListingDto::from_form(&form(&[("photoUrls", "not json")])).unwrap_err();
        assert!(err.contains("photoUrls"));
    }

    #[test]
    fn test_missing_required_fields() {
        let dto = CreateListingDto {
            first_name: Some("Jane".into()),
            ..Default::default()
        };
        let missing = dto.missing_required_fields();
        assert!(!missing.contains(&"firstName"));
        assert!(missing.contains(&"description"));
        assert_eq!(missing.len(), 10);
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email_address("seller@example.com").is_ok());
        assert!(validate_email_address("no-at-sign.com").is_err());
        assert!(validate_email_address("two words@example.com").is_err());
        assert!(validate_email_address("missing@tld").is_err());
    }

    #[test]
    fn test_contact_notice_defaults() {
        let notice = ContactNotice::from_form(
            ContactFormDto {
                name: " Ann ".into(),
                email: "ann@example.com".into(),
                phone: Some("  ".into()),
                interest: None,
                message: "Hello".into(),
            },
            Utc::now(),
        );
        assert_eq!(notice.name, "Ann");
        assert_eq!(notice.phone, "Not provided");
        assert_eq!(notice.interest, "General Inquiry");
    }
}
