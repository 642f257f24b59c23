// src/service/listing_service.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    db::listingdb::ListingExt,
    dtos::listingdtos::{
        ContactFormDto, ContactNotice, CreateListingDto, ListingResponseDto, SellerInquiryDto,
        SubmissionReceiptDto, UploadedPhoto, Viewer,
    },
    models::listingmodel::{
        is_remote_locator, Listing, ListingStatus, NewListing, NewPhoto, PropertyType,
    },
    service::{
        error::ServiceError,
        lifecycle_service::LifecycleService,
        notification_service::{NotificationDispatcher, NotificationGateway, NotificationJob},
    },
};

const ALLOWED_IMAGE_TYPES: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub upload_dir: PathBuf,
    pub max_photo_count: usize,
    pub max_photo_bytes: usize,
}

/// Entry point for submissions and reads. Lifecycle decisions live in
/// `LifecycleService`; this type only validates, stores and formats.
pub struct ListingService {
    store: Arc<dyn ListingExt>,
    lifecycle: Arc<LifecycleService>,
    notifier: Arc<dyn NotificationGateway>,
    dispatcher: NotificationDispatcher,
    uploads: UploadSettings,
}

impl ListingService {
    pub fn new(
        store: Arc<dyn ListingExt>,
        lifecycle: Arc<LifecycleService>,
        notifier: Arc<dyn NotificationGateway>,
        dispatcher: NotificationDispatcher,
        uploads: UploadSettings,
    ) -> Self {
        Self {
            store,
            lifecycle,
            notifier,
            dispatcher,
            uploads,
        }
    }

    pub async fn submit_listing(
        &self,
        dto: CreateListingDto,
        photos: Vec<UploadedPhoto>,
    ) -> Result<SubmissionReceiptDto, ServiceError> {
        let property_type = self.validate_submission(&dto, &photos)?;

        let dates = self.lifecycle.dates_for_new_listing();
        let new_listing = build_new_listing(dto.clone(), property_type, dates.submission_date, dates.expiration_date);

        let mut written: Vec<PathBuf> = Vec::with_capacity(photos.len());
        let result = self
            .store_submission(&new_listing, &dto.photo_urls, &photos, &mut written)
            .await;

        let listing_id = match result {
            Ok(id) => id,
            Err(e) => {
                remove_files(&written).await;
                tracing::error!("Listing submission failed: {}", e);
                return Err(e);
            }
        };

        tracing::info!(
            "Listing {} submitted with {} photos, expires {}",
            listing_id,
            photos.len() + dto.photo_urls.len(),
            dates.expiration_date
        );

        match self.store.get_listing_by_id(listing_id).await {
            Ok(Some(listing)) => {
                self.dispatcher.dispatch(NotificationJob::Confirmation(listing.clone()));
                self.dispatcher.dispatch(NotificationJob::AdminNotice(listing));
            }
            Ok(None) => tracing::warn!("Listing {} vanished before notifications were queued", listing_id),
            Err(e) => tracing::error!("Could not load listing {} for notifications: {}", listing_id, e),
        }

        Ok(SubmissionReceiptDto {
            listing_id,
            expiration_date: dates.expiration_date,
        })
    }

    fn validate_submission(
        &self,
        dto: &CreateListingDto,
        photos: &[UploadedPhoto],
    ) -> Result<PropertyType, ServiceError> {
        let missing = dto.missing_required_fields();
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let raw_type = dto.property_type.as_deref().unwrap_or_default();
        let property_type = PropertyType::parse(raw_type).ok_or_else(|| {
            ServiceError::Validation(format!("Unknown property type: {}", raw_type))
        })?;

        if property_type.is_residential() && (dto.bedrooms.is_none() || dto.bathrooms.is_none()) {
            return Err(ServiceError::Validation(
                "Bedrooms and bathrooms are required for residential properties".to_string(),
            ));
        }

        dto.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        // Uploaded files and photo URLs share one limit.
        if photos.len() + dto.photo_urls.len() > self.uploads.max_photo_count {
            return Err(ServiceError::Validation(format!(
                "Too many photos: at most {} are allowed",
                self.uploads.max_photo_count
            )));
        }

        for photo in photos {
            if photo.bytes.len() > self.uploads.max_photo_bytes {
                return Err(ServiceError::Validation(format!(
                    "{} is larger than {} bytes",
                    photo.original_name, self.uploads.max_photo_bytes
                )));
            }
            if image_extension(photo).is_none() {
                return Err(ServiceError::Validation(format!(
                    "{} is not an allowed image file",
                    photo.original_name
                )));
            }
        }

        if let Some(url) = dto.photo_urls.iter().find(|url| !is_remote_locator(url)) {
            return Err(ServiceError::Validation(format!(
                "Photo URL must be absolute http(s): {}",
                url
            )));
        }

        Ok(property_type)
    }

    async fn store_submission(
        &self,
        listing: &NewListing,
        photo_urls: &[String],
        photos: &[UploadedPhoto],
        written: &mut Vec<PathBuf>,
    ) -> Result<i64, ServiceError> {
        tokio::fs::create_dir_all(&self.uploads.upload_dir).await?;

        let mut new_photos = Vec::with_capacity(photos.len() + photo_urls.len());
        for (index, photo) in photos.iter().enumerate() {
            let ext = image_extension(photo).unwrap_or("jpg");
            let filename = format!("listing-{}.{}", Uuid::new_v4(), ext);
            let path = self.uploads.upload_dir.join(&filename);

            write_photo(path, &photo.bytes, written).await?;

            new_photos.push(NewPhoto {
                locator: filename,
                original_name: photo.original_name.clone(),
                size: photo.bytes.len() as i64,
                mime_type: photo.mime_type.clone(),
                display_order: index as i64,
            });
        }

        for (index, url) in photo_urls.iter().enumerate() {
            new_photos.push(NewPhoto {
                locator: url.clone(),
                original_name: format!("Extracted Photo {}", index + 1),
                size: 0,
                mime_type: "image/jpeg".to_string(),
                display_order: (photos.len() + index) as i64,
            });
        }

        self.store.insert_listing_with_photos(listing, &new_photos).await
    }

    pub async fn list_active(&self, viewer: Viewer) -> Result<Vec<ListingResponseDto>, ServiceError> {
        let listings = self.store.get_active_listings(self.lifecycle.now()).await?;

        let mut response = Vec::with_capacity(listings.len());
        for listing in &listings {
            let photos = self.store.get_photos_by_listing_id(listing.id).await?;
            response.push(ListingResponseDto::from_listing(listing, &photos, viewer));
        }
        Ok(response)
    }

    /// Public readers only see listings that are currently live; admins see any status.
    pub async fn get_listing(
        &self,
        listing_id: i64,
        viewer: Viewer,
    ) -> Result<ListingResponseDto, ServiceError> {
        let listing = match viewer {
            Viewer::Admin => self.find_listing(listing_id).await?,
            Viewer::Public => self.find_live_listing(listing_id).await?,
        };
        let photos = self.store.get_photos_by_listing_id(listing.id).await?;
        Ok(ListingResponseDto::from_listing(&listing, &photos, viewer))
    }

    async fn find_listing(&self, listing_id: i64) -> Result<Listing, ServiceError> {
        self.store
            .get_listing_by_id(listing_id)
            .await?
            .ok_or(ServiceError::ListingNotFound(listing_id))
    }

    async fn find_live_listing(&self, listing_id: i64) -> Result<Listing, ServiceError> {
        let listing = self.find_listing(listing_id).await?;
        if listing.status != ListingStatus::Active || listing.expiration_date <= self.lifecycle.now() {
            return Err(ServiceError::ListingNotFound(listing_id));
        }
        Ok(listing)
    }

    /// Forwards a buyer's message to the seller without exposing the seller's address.
    pub async fn contact_seller(
        &self,
        listing_id: i64,
        inquiry: SellerInquiryDto,
    ) -> Result<(), ServiceError> {
        inquiry
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let listing = self.find_live_listing(listing_id).await?;
        self.notifier
            .send_seller_inquiry(&listing, &inquiry)
            .await
            .map_err(|e| {
                tracing::error!("Failed to forward inquiry for listing {}: {}", listing_id, e);
                ServiceError::from(e)
            })?;

        tracing::info!("Inquiry forwarded to seller of listing {}", listing_id);
        Ok(())
    }

    /// Website contact form. A failed send is logged; the submitter still gets success.
    pub async fn submit_contact(&self, form: ContactFormDto) -> Result<ContactNotice, ServiceError> {
        form.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let notice = ContactNotice::from_form(form, self.lifecycle.now());
        match self.notifier.send_contact_notice(&notice).await {
            Ok(()) => tracing::info!("Contact form from {} forwarded", notice.email),
            Err(e) => tracing::error!("Failed to send contact form from {}: {}", notice.email, e),
        }
        Ok(notice)
    }

    pub async fn remove_listing(&self, listing_id: i64) -> Result<ListingResponseDto, ServiceError> {
        let listing = self.lifecycle.remove_listing(listing_id).await?;
        let photos = self.store.get_photos_by_listing_id(listing_id).await?;
        Ok(ListingResponseDto::from_listing(&listing, &photos, Viewer::Admin))
    }

    /// Physical delete. Local photo files are unlinked best-effort afterwards.
    pub async fn delete_listing(&self, listing_id: i64) -> Result<usize, ServiceError> {
        let photos = self.store.delete_listing(listing_id).await?;

        let local: Vec<PathBuf> = photos
            .iter()
            .filter(|p| !p.is_remote())
            .map(|p| self.uploads.upload_dir.join(&p.locator))
            .collect();
        remove_files(&local).await;

        tracing::info!("Listing {} deleted with {} photos", listing_id, photos.len());
        Ok(photos.len())
    }

    /// Reads an uploaded photo. `Ok(None)` when no such file exists.
    pub async fn load_photo(
        &self,
        filename: &str,
    ) -> Result<Option<(Vec<u8>, &'static str)>, ServiceError> {
        if !is_safe_filename(filename) {
            return Err(ServiceError::Validation("Invalid filename".to_string()));
        }

        let path = self.uploads.upload_dir.join(filename);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some((bytes, content_type_for(&path)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn build_new_listing(
    dto: CreateListingDto,
    property_type: PropertyType,
    submission_date: chrono::DateTime<chrono::Utc>,
    expiration_date: chrono::DateTime<chrono::Utc>,
) -> NewListing {
    NewListing {
        first_name: dto.first_name.unwrap_or_default(),
        last_name: dto.last_name.unwrap_or_default(),
        email: dto.email.unwrap_or_default(),
        phone: dto.phone.unwrap_or_default(),
        private_contact: dto.private_contact,
        address: dto.address.unwrap_or_default(),
        city: dto.city.unwrap_or_default(),
        state: dto
            .state
            .map(|s| s.to_ascii_uppercase())
            .unwrap_or_else(|| "WA".to_string()),
        zip: dto.zip.unwrap_or_default(),
        property_type,
        price: dto.price.unwrap_or_default(),
        sqft: dto.sqft.unwrap_or_default(),
        bedrooms: dto.bedrooms,
        bathrooms: dto.bathrooms,
        year_built: dto.year_built,
        lot_size: dto.lot_size,
        features: dto.features.unwrap_or_default(),
        description: dto.description.unwrap_or_default(),
        building_class: dto.building_class,
        zoning: dto.zoning,
        occupancy_rate: dto.occupancy_rate,
        cap_rate: dto.cap_rate,
        gross_income: dto.gross_income,
        operating_expenses: dto.operating_expenses,
        number_of_units: dto.number_of_units,
        parking_spaces: dto.parking_spaces,
        lease_type: dto.lease_type,
        mls_number: dto.mls_number,
        external_url: dto.external_url,
        listing_source: dto.listing_source.unwrap_or_else(|| "fsbo".to_string()),
        submission_date,
        expiration_date,
    }
}

/// Extension of an acceptable image upload; both the filename and the MIME type must agree.
fn image_extension(photo: &UploadedPhoto) -> Option<&'static str> {
    let ext = Path::new(&photo.original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;
    let ext = ALLOWED_IMAGE_TYPES.iter().copied().find(|allowed| *allowed == ext)?;

    let mime = photo.mime_type.to_ascii_lowercase();
    let subtype = mime.strip_prefix("image/")?;
    if !ALLOWED_IMAGE_TYPES.contains(&subtype) {
        return None;
    }
    Some(ext)
}

pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty() && !filename.contains("..") && !filename.contains('/') && !filename.contains('\\')
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Records `path` before writing so a write that fails midway is still cleaned up.
async fn write_photo(
    path: PathBuf,
    bytes: &[u8],
    written: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    written.push(path.clone());
    tokio::fs::write(&path, bytes).await
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove photo file {}: {}", path.display(), e),
        }
    }
}
