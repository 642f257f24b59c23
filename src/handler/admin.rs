use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use serde_json::json;

use crate::{
    dtos::listingdtos::Viewer, error::HttpError, middleware::AdminIdentity, AppState,
};

/// Routes behind `admin_auth`.
pub fn admin_handler() -> Router {
    Router::new()
        .route("/listing/:id", get(get_listing).delete(delete_listing))
        .route("/listing/:id/remove", put(remove_listing))
}

pub async fn get_listing(
    Path(listing_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = app_state
        .listing_service
        .get_listing(listing_id, Viewer::Admin)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(json!({
        "status": "success",
        "listing": listing,
    })))
}

pub async fn remove_listing(
    Path(listing_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = app_state
        .listing_service
        .remove_listing(listing_id)
        .await
        .map_err(HttpError::from)?;

    tracing::info!("Listing {} removed by {}", listing_id, admin.subject);

    Ok(Json(json!({
        "status": "success",
        "message": "Listing removed",
        "listing": listing,
    })))
}

pub async fn delete_listing(
    Path(listing_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
) -> Result<impl IntoResponse, HttpError> {
    let photos_deleted = app_state
        .listing_service
        .delete_listing(listing_id)
        .await
        .map_err(HttpError::from)?;

    tracing::info!("Listing {} deleted by {}", listing_id, admin.subject);

    Ok(Json(json!({
        "status": "success",
        "message": "Listing deleted",
        "photosDeleted": photos_deleted,
    })))
}
