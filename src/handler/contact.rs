use std::sync::Arc;

use axum::{middleware, response::IntoResponse, routing::post, Extension, Json, Router};
use serde_json::json;

use crate::{
    dtos::listingdtos::ContactFormDto, error::HttpError, middleware::contact_rate_limit,
    AppState,
};

pub fn contact_handler() -> Router {
    Router::new().route(
        "/submit",
        post(submit_contact).layer(middleware::from_fn(contact_rate_limit)),
    )
}

pub async fn submit_contact(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ContactFormDto>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .listing_service
        .submit_contact(body)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(json!({
        "status": "success",
        "message": "Thank you for contacting us! We will get back to you soon.",
    })))
}
