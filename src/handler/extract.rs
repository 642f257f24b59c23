use std::sync::Arc;

use axum::{response::IntoResponse, Extension, Json};
use serde_json::json;
use validator::Validate;

use crate::{dtos::listingdtos::ExtractRequestDto, error::HttpError, AppState};

pub async fn extract_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ExtractRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let listing = app_state
        .extractor
        .extract(&body.url)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(json!({
        "status": "success",
        "source": listing.source,
        "data": listing,
    })))
}
