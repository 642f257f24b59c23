// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        admin::admin_handler, contact::contact_handler, listings::listings_handler,
    },
    middleware::admin_auth,
    AppState,
};

/// Multipart overhead allowed on top of the photo payload itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let database = match sqlx::query("SELECT 1").execute(&app_state.db_client.pool).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!("Health check could not reach the database: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "database": database,
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state
        .env
        .max_photo_count
        .saturating_mul(app_state.env.max_photo_bytes)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let fsbo_routes = Router::new()
        .merge(listings_handler(body_limit))
        .nest(
            "/admin",
            admin_handler().layer(middleware::from_fn(admin_auth)),
        );

    let api_route = Router::new()
        .nest("/fsbo", fsbo_routes)
        .nest("/contact", contact_handler());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::test_support::memory_client,
        extraction::testing::StaticFetcher,
        service::{
            listing_service::tests::{start_time, valid_form},
            notification_service::testing::{RecordingGateway, SentNotification},
        },
        utils::{
            clock::ManualClock,
            token::{create_token, ADMIN_ROLE},
        },
    };
    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    const BOUNDARY: &str = "fsbo-test-boundary";

    struct TestApp {
        app: Router,
        gateway: Arc<RecordingGateway>,
        _dir: tempfile::TempDir,
    }

    async fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().to_str().unwrap());
        let gateway = Arc::new(RecordingGateway::default());
        let fetcher = Arc::new(StaticFetcher::serving(
            r#"<html><body>
                 <h1 data-testid="property-street">55 Pine Ave, Tacoma, WA 98402</h1>
                 <span data-testid="price">$489,900</span>
               </body></html>"#,
        ));
        let state = Arc::new(AppState::new(
            config,
            memory_client().await,
            gateway.clone(),
            Arc::new(ManualClock::new(start_time())),
            fetcher,
        ));

        TestApp {
            app: create_router(state),
            gateway,
            _dir: dir,
        }
    }

    fn multipart_body(fields: &HashMap<String, String>, files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        for (filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"photos\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn submit_request(fields: &HashMap<String, String>, files: &[(&str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/fsbo/submit")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, files)))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "198.51.100.20")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_token(method: Method, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn submit_valid_listing(app: &Router) -> i64 {
        let response = send(app, submit_request(&valid_form(), &[("front.jpg", &b"\xFF\xD8\xFF\xE0"[..])])).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["listingId"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let t = test_app().await;
        let response = send(&t.app, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_submitted_listing_is_public_with_contact_masked() {
        let t = test_app().await;
        let id = submit_valid_listing(&t.app).await;

        let body = body_json(send(&t.app, get("/api/fsbo/listings")).await).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["count"], 1);
        let listing = &body["listings"][0];
        assert_eq!(listing["id"], id);
        assert_eq!(listing["email"], Value::Null);
        assert_eq!(listing["phone"], Value::Null);

        let photo_url = listing["photos"][0]["url"].as_str().unwrap().to_string();
        assert!(photo_url.starts_with("/api/fsbo/photo/listing-"));
        let photo = send(&t.app, get(&photo_url)).await;
        assert_eq!(photo.status(), StatusCode::OK);
        assert_eq!(photo.headers()[header::CONTENT_TYPE], "image/jpeg");

        let single = send(&t.app, get(&format!("/api/fsbo/listing/{}", id))).await;
        assert_eq!(single.status(), StatusCode::OK);
        assert_eq!(body_json(single).await["listing"]["city"], "Seattle");
    }

    #[tokio::test]
    async fn test_submission_with_missing_fields_is_rejected() {
        let t = test_app().await;
        let mut form = valid_form();
        form.remove("description");

        let response = send(&t.app, submit_request(&form, &[])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert!(body["message"].as_str().unwrap().contains("description"));
    }

    #[tokio::test]
    async fn test_unknown_listing_and_bad_photo_names() {
        let t = test_app().await;

        let response = send(&t.app, get("/api/fsbo/listing/999")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Listing not found");

        let response = send(&t.app, get("/api/fsbo/photo/..secret.jpg")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&t.app, get("/api/fsbo/photo/listing-missing.jpg")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_token() {
        let t = test_app().await;
        let id = submit_valid_listing(&t.app).await;
        let uri = format!("/api/fsbo/admin/listing/{}/remove", id);

        let response = send(
            &t.app,
            Request::builder().method(Method::PUT).uri(&uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let seller = create_token("john@example.com", "seller", b"test-secret", 60).unwrap();
        let response = send(&t.app, with_token(Method::PUT, &uri, &seller)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let forged = create_token("ops@example.com", ADMIN_ROLE, b"development-secret", 60).unwrap();
        let response = send(
            &t.app,
            with_token(Method::GET, &format!("/api/fsbo/admin/listing/{}", id), &forged),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["listing"], Value::Null);

        let admin = create_token("ops@example.com", ADMIN_ROLE, b"test-secret", 60).unwrap();
        let read = send(
            &t.app,
            with_token(Method::GET, &format!("/api/fsbo/admin/listing/{}", id), &admin),
        )
        .await;
        assert_eq!(read.status(), StatusCode::OK);
        assert_eq!(body_json(read).await["listing"]["email"], "john@example.com");

        let response = send(&t.app, with_token(Method::PUT, &uri, &admin)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["listing"]["status"], "removed");

        let public = send(&t.app, get(&format!("/api/fsbo/listing/{}", id))).await;
        assert_eq!(public.status(), StatusCode::NOT_FOUND);

        let again = send(&t.app, with_token(Method::PUT, &uri, &admin)).await;
        assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_delete_removes_listing() {
        let t = test_app().await;
        let id = submit_valid_listing(&t.app).await;
        let admin = create_token("ops@example.com", ADMIN_ROLE, b"test-secret", 60).unwrap();
        let uri = format!("/api/fsbo/admin/listing/{}", id);

        let response = send(&t.app, with_token(Method::DELETE, &uri, &admin)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["photosDeleted"], 1);

        let response = send(&t.app, with_token(Method::GET, &uri, &admin)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_contact_form_is_rate_limited() {
        let t = test_app().await;
        let form = json!({
            "name": "Ann Buyer",
            "email": "ann@example.com",
            "message": "Do you list condos?"
        });

        for _ in 0..5 {
            let response = send(
                &t.app,
                json_request(Method::POST, "/api/contact/submit", form.clone()),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let limited = send(&t.app, json_request(Method::POST, "/api/contact/submit", form)).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        assert_eq!(
            t.gateway.sent(),
            vec![SentNotification::Contact("ann@example.com".to_string()); 5]
        );
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_reset_contact_limit() {
        let t = test_app().await;
        let form = json!({
            "name": "Ann Buyer",
            "email": "ann@example.com",
            "message": "Do you list condos?"
        });
        let peer = SocketAddr::from(([192, 0, 2, 10], 51000));

        for i in 0..6 {
            let mut request = Request::builder()
                .method(Method::POST)
                .uri("/api/contact/submit")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", format!("198.51.100.{}", i))
                .body(Body::from(form.to_string()))
                .unwrap();
            request.extensions_mut().insert(ConnectInfo(peer));

            let expected = if i < 5 {
                StatusCode::OK
            } else {
                StatusCode::TOO_MANY_REQUESTS
            };
            assert_eq!(send(&t.app, request).await.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_contact_seller_forwards_inquiry() {
        let t = test_app().await;
        let id = submit_valid_listing(&t.app).await;
        let inquiry = json!({
            "name": "Ann Buyer",
            "email": "ann@example.com",
            "message": "Is the house still available?"
        });

        let response = send(
            &t.app,
            json_request(Method::POST, &format!("/api/fsbo/contact/{}", id), inquiry.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(t
            .gateway
            .sent()
            .contains(&SentNotification::SellerInquiry(id, "ann@example.com".to_string())));

        let missing = send(
            &t.app,
            json_request(Method::POST, "/api/fsbo/contact/999", inquiry),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_extract_endpoint() {
        let t = test_app().await;

        let response = send(
            &t.app,
            json_request(
                Method::POST,
                "/api/fsbo/extract",
                json!({ "url": "https://www.zillow.com/homedetails/55-pine" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["source"], "zillow");
        assert_eq!(body["data"]["city"], "Tacoma");
        assert_eq!(body["data"]["price"], 489_900);

        let response = send(
            &t.app,
            json_request(Method::POST, "/api/fsbo/extract", json!({ "url": "nope" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
