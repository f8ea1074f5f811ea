mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{craft_token, now_secs, test_app, test_app_with};
use inkpost::AppConfig;
use serde_json::json;
use uuid::Uuid;

// --- Gate Rejections ---

#[tokio::test]
async fn test_missing_authorization_header_is_401() {
    let app = test_app();

    let (status, body) = app
        .send(Method::GET, &format!("/api/v1/blog/{}", Uuid::new_v4()), None, None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Invalid or expired token");
}

#[tokio::test]
async fn test_token_without_bearer_scheme_is_401() {
    let app = test_app();
    let (token, _) = app.signup("a@x.com", "secret1").await;

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/blog/{}", Uuid::new_v4()))
        .header(header::AUTHORIZATION, token)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send_request(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_401() {
    let app = test_app();
    let now = now_secs();
    let forged = craft_token(
        "not-the-server-secret",
        json!({ "id": Uuid::new_v4().to_string(), "iat": now, "exp": now + 3600 }),
    );

    let (status, _) = app
        .send(Method::POST, "/api/v1/blog", Some(&forged), Some(json!({ "title": "t", "content": "c" })))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_401() {
    let app = test_app();
    let now = now_secs();
    let expired = app.craft_token(json!({ "id": Uuid::new_v4().to_string(), "iat": now - 120, "exp": now - 60 }));

    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/blog/{}", Uuid::new_v4()), Some(&expired), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_401() {
    let app = test_app();

    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/blog/{}", Uuid::new_v4()), Some("not.a.jwt"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verified_token_without_identity_is_403() {
    let app = test_app();
    let now = now_secs();

    let no_id = app.craft_token(json!({ "iat": now, "exp": now + 3600 }));
    let empty_id = app.craft_token(json!({ "id": "", "iat": now, "exp": now + 3600 }));

    for token in [no_id, empty_id] {
        let (status, body) = app
            .send(Method::GET, &format!("/api/v1/blog/{}", Uuid::new_v4()), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Unauthorized request");
    }
}

#[tokio::test]
async fn test_identity_that_is_not_a_uuid_is_401() {
    let app = test_app();
    let now = now_secs();
    let token = app.craft_token(json!({ "id": "user-42", "iat": now, "exp": now + 3600 }));

    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/blog/{}", Uuid::new_v4()), Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_request_never_reaches_the_handler() {
    let app = test_app();

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/blog",
            Some("bogus"),
            Some(json!({ "title": "sneaky", "content": "c", "published": true })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.bulk_titles().await.is_empty());
}

// --- Gate Acceptance ---

#[tokio::test]
async fn test_issued_token_passes_the_gate() {
    let app = test_app();
    let (token, _) = app.signup("a@x.com", "secret1").await;

    // Passes the gate; the post simply does not exist.
    let (status, body) = app
        .send(Method::GET, &format!("/api/v1/blog/{}", Uuid::new_v4()), Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Blog not found");
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let app = test_app();

    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::GET, "/api/v1/blog/bulk", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blogs"], json!([]));
}

// --- Read Route Policy ---

#[tokio::test]
async fn test_gated_read_routes_require_a_token() {
    let config = AppConfig {
        gate_read_routes: true,
        ..AppConfig::default()
    };
    let app = test_app_with(config);

    let (status, _) = app.send(Method::GET, "/api/v1/blog/bulk", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = app.signup("a@x.com", "secret1").await;
    let (status, _) = app.send(Method::GET, "/api/v1/blog/bulk", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_token_on_ungated_listing_is_treated_as_anonymous() {
    let app = test_app();
    let (token, author) = app.signup("a@x.com", "secret1").await;
    app.create_post(&token, "draft", false).await;
    app.create_post(&token, "live", true).await;

    let (status, body) = app
        .send(Method::GET, &format!("/api/v1/blog/author/{author}"), Some("bogus"), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blogs"].as_array().unwrap().len(), 1);
    assert_eq!(body["blogs"][0]["title"], "live");
}

// --- Correlation ---

#[tokio::test]
async fn test_response_carries_request_id() {
    let app = test_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
