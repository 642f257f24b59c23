use chrono::{DateTime, Datelike, Utc};

use super::sendmail::{render_template, sanitize_text, OutgoingEmail};
use crate::{
    dtos::listingdtos::{ContactNotice, SellerInquiryDto},
    models::listingmodel::Listing,
};

const CONFIRMATION_TEMPLATE: &str = include_str!("templates/listing-confirmation.html");
const REMINDER_TEMPLATE: &str = include_str!("templates/expiration-reminder.html");
const ADMIN_NOTICE_TEMPLATE: &str = include_str!("templates/admin-notice.html");
const CONTACT_FORM_TEMPLATE: &str = include_str!("templates/contact-form.html");
const SELLER_INQUIRY_TEMPLATE: &str = include_str!("templates/seller-inquiry.html");

/// Settings shared by every listing email.
#[derive(Debug, Clone)]
pub struct MailContext {
    pub website_url: String,
    pub admin_email: String,
    pub listing_duration_days: i64,
    pub reminder_days_before: i64,
}

impl MailContext {
    fn listings_url(&self) -> String {
        format!("{}/fsbo-listings.html", self.website_url.trim_end_matches('/'))
    }

    fn relist_url(&self) -> String {
        format!("{}/fsbo.html", self.website_url.trim_end_matches('/'))
    }

    fn listing_url(&self, listing_id: i64) -> String {
        format!("{}?id={}", self.listings_url(), listing_id)
    }
}

/// 1234567 -> "1,234,567"
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn size_summary(listing: &Listing) -> String {
    let sqft = format!("{} sq ft", format_thousands(listing.sqft));
    match (listing.bedrooms, listing.bathrooms) {
        (Some(beds), Some(baths)) => format!("{} bed, {} bath | {}", beds, baths, sqft),
        _ => sqft,
    }
}

pub fn listing_confirmation_email(listing: &Listing, ctx: &MailContext) -> OutgoingEmail {
    let placeholders = [
        ("first_name", sanitize_text(&listing.first_name)),
        ("full_address", sanitize_text(&listing.full_address())),
        ("property_type", listing.property_type.to_str().to_string()),
        ("price", format_thousands(listing.price)),
        ("size_summary", size_summary(listing)),
        ("duration_days", ctx.listing_duration_days.to_string()),
        ("reminder_days", ctx.reminder_days_before.to_string()),
        ("expiration_date", format_date(listing.expiration_date)),
        ("listings_url", ctx.listings_url()),
        ("year", listing.submission_date.year().to_string()),
    ];

    OutgoingEmail {
        to: listing.email.clone(),
        reply_to: None,
        subject: "FSBO Listing Submitted Successfully - VDI Realty".to_string(),
        html_body: render_template(CONFIRMATION_TEMPLATE, &placeholders),
    }
}

pub fn expiration_reminder_email(
    listing: &Listing,
    now: DateTime<Utc>,
    ctx: &MailContext,
) -> OutgoingEmail {
    let days_remaining = listing.days_remaining(now);
    let placeholders = [
        ("first_name", sanitize_text(&listing.first_name)),
        ("days_remaining", days_remaining.to_string()),
        ("expiration_date", format_date(listing.expiration_date)),
        ("address", sanitize_text(&listing.address)),
        (
            "city_line",
            sanitize_text(&format!("{}, {} {}", listing.city, listing.state, listing.zip)),
        ),
        ("size_summary", size_summary(listing)),
        ("price", format_thousands(listing.price)),
        ("duration_days", ctx.listing_duration_days.to_string()),
        ("relist_url", ctx.relist_url()),
        ("year", now.year().to_string()),
    ];

    OutgoingEmail {
        to: listing.email.clone(),
        reply_to: None,
        subject: format!(
            "Your FSBO Listing Expires in {} Days - Relist Now (Free!)",
            days_remaining
        ),
        html_body: render_template(REMINDER_TEMPLATE, &placeholders),
    }
}

pub fn admin_notice_email(listing: &Listing, ctx: &MailContext) -> OutgoingEmail {
    let privacy = if listing.private_contact {
        "Contact info is PRIVATE"
    } else {
        "Contact info is PUBLIC"
    };
    let placeholders = [
        ("listing_id", listing.id.to_string()),
        ("full_address", sanitize_text(&listing.full_address())),
        ("seller_name", sanitize_text(&listing.seller_name())),
        ("email", sanitize_text(&listing.email)),
        ("phone", sanitize_text(&listing.phone)),
        ("price", format_thousands(listing.price)),
        ("property_type", listing.property_type.to_str().to_string()),
        ("size_summary", size_summary(listing)),
        ("privacy", privacy.to_string()),
        ("expiration_date", format_date(listing.expiration_date)),
        ("listings_url", ctx.listings_url()),
    ];

    OutgoingEmail {
        to: ctx.admin_email.clone(),
        reply_to: None,
        subject: "New FSBO Listing Submitted".to_string(),
        html_body: render_template(ADMIN_NOTICE_TEMPLATE, &placeholders),
    }
}

pub fn contact_form_email(notice: &ContactNotice, ctx: &MailContext) -> OutgoingEmail {
    let placeholders = [
        ("name", sanitize_text(&notice.name)),
        ("email", sanitize_text(&notice.email)),
        ("phone", sanitize_text(&notice.phone)),
        ("interest", sanitize_text(&notice.interest)),
        ("message", sanitize_text(&notice.message)),
        ("submitted_at", notice.submitted_at.format("%B %-d, %Y %H:%M UTC").to_string()),
    ];

    OutgoingEmail {
        to: ctx.admin_email.clone(),
        reply_to: Some(notice.email.clone()),
        subject: format!("New Contact from {} - VDI Realty", notice.name),
        html_body: render_template(CONTACT_FORM_TEMPLATE, &placeholders),
    }
}

pub fn seller_inquiry_email(
    listing: &Listing,
    inquiry: &SellerInquiryDto,
    ctx: &MailContext,
) -> OutgoingEmail {
    let phone = inquiry
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("Not provided");
    let placeholders = [
        ("first_name", sanitize_text(&listing.first_name)),
        ("full_address", sanitize_text(&listing.full_address())),
        ("name", sanitize_text(&inquiry.name)),
        ("email", sanitize_text(&inquiry.email)),
        ("phone", sanitize_text(phone)),
        ("message", sanitize_text(&inquiry.message)),
        ("listing_url", ctx.listing_url(listing.id)),
    ];

    OutgoingEmail {
        to: listing.email.clone(),
        reply_to: Some(inquiry.email.trim().to_string()),
        subject: format!("Inquiry about {} - VDI Realty", listing.address),
        html_body: render_template(SELLER_INQUIRY_TEMPLATE, &placeholders),
    }
}
