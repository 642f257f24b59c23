use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;

use crate::{
    dtos::listingdtos::{CreateListingDto, SellerInquiryDto, UploadedPhoto, Viewer},
    error::{ErrorMessage, HttpError},
    handler::extract::extract_listing,
    middleware::contact_rate_limit,
    service::error::ServiceError,
    AppState,
};

const PHOTOS_FIELD: &str = "photos";

/// Public FSBO routes. `body_limit` caps the multipart submission size.
pub fn listings_handler(body_limit: usize) -> Router {
    Router::new()
        .route(
            "/submit",
            post(submit_listing).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/listings", get(get_listings))
        .route("/listing/:id", get(get_listing))
        .route("/photo/:filename", get(get_photo))
        .route(
            "/contact/:id",
            post(contact_seller).layer(middleware::from_fn(contact_rate_limit)),
        )
        .route("/extract", post(extract_listing))
}

pub async fn submit_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let (fields, photos) = read_submission(multipart).await?;
    let dto = CreateListingDto::from_form(&fields).map_err(|e| HttpError::bad_request(e))?;

    let receipt = app_state
        .listing_service
        .submit_listing(dto, photos)
        .await
        .map_err(HttpError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Listing submitted successfully",
            "listingId": receipt.listing_id,
            "expirationDate": receipt.expiration_date,
        })),
    ))
}

/// Splits a multipart body into text fields and files from the `photos` field.
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(HashMap<String, String>, Vec<UploadedPhoto>), HttpError> {
    let mut fields = HashMap::new();
    let mut photos = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::new(e.body_text(), e.status()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == PHOTOS_FIELD {
            let original_name = field.file_name().unwrap_or_default().to_string();
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| HttpError::new(e.body_text(), e.status()))?;

            // Browsers send an empty part when no file was chosen
            if original_name.is_empty() && bytes.is_empty() {
                continue;
            }
            photos.push(UploadedPhoto {
                original_name,
                mime_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| HttpError::new(e.body_text(), e.status()))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, photos))
}

pub async fn get_listings(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let listings = app_state
        .listing_service
        .list_active(Viewer::Public)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(json!({
        "status": "success",
        "count": listings.len(),
        "listings": listings,
    })))
}

pub async fn get_listing(
    Path(listing_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = app_state
        .listing_service
        .get_listing(listing_id, Viewer::Public)
        .await
        .map_err(|e| match e {
            ServiceError::ListingNotFound(_) => {
                HttpError::not_found(ErrorMessage::ListingNotFound.to_string())
            }
            other => HttpError::from(other),
        })?;

    Ok(Json(json!({
        "status": "success",
        "listing": listing,
    })))
}

pub async fn get_photo(
    Path(filename): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let photo = app_state
        .listing_service
        .load_photo(&filename)
        .await
        .map_err(|e| match e {
            ServiceError::Validation(_) => {
                HttpError::bad_request(ErrorMessage::InvalidPhotoFilename.to_string())
            }
            other => HttpError::from(other),
        })?;

    let (bytes, content_type) =
        photo.ok_or_else(|| HttpError::not_found(ErrorMessage::PhotoNotFound.to_string()))?;

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

pub async fn contact_seller(
    Path(listing_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<SellerInquiryDto>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .listing_service
        .contact_seller(listing_id, body)
        .await
        .map_err(|e| match e {
            ServiceError::ListingNotFound(_) => {
                HttpError::not_found(ErrorMessage::ListingNotFound.to_string())
            }
            ServiceError::Notification(_) => HttpError::server_error("Failed to send inquiry"),
            other => HttpError::from(other),
        })?;

    Ok(Json(json!({
        "status": "success",
        "message": "Your inquiry has been sent to the seller",
    })))
}
