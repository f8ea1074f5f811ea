mod common;

use axum::http::{Method, StatusCode};
use common::test_app;
use serde_json::json;
use uuid::Uuid;

// --- Signup / Signin ---

#[tokio::test]
async fn test_signup_returns_token_and_rejects_duplicate_email() {
    let app = test_app();

    let (token, id) = app.signup("a@x.com", "secret1").await;
    assert!(!token.is_empty());
    assert!(app.repo.account_exists(id));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/user/signup",
            None,
            Some(json!({ "email": "a@x.com", "password": "another1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["msg"].is_string());
}

#[tokio::test]
async fn test_signup_rejects_invalid_shapes() {
    let app = test_app();

    for body in [
        json!({ "email": "not-an-email", "password": "secret1" }),
        json!({ "email": "a@x.com", "password": "short" }),
        json!({ "email": "a@x.com" }),
        json!("just a string"),
    ] {
        let (status, _) = app.send(Method::POST, "/api/v1/user/signup", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_signin_outcomes() {
    let app = test_app();
    let (_, id) = app.signup("a@x.com", "secret1").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/user/signin",
            None,
            Some(json!({ "email": "nobody@x.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "User not found");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/user/signin",
            None,
            Some(json!({ "email": "a@x.com", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Wrong password");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/user/signin",
            None,
            Some(json!({ "email": "a@x.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.identity_of(body["jwt"].as_str().unwrap()), id);
}

// --- Profile ---

#[tokio::test]
async fn test_userinfo_reports_post_count_without_credentials() {
    let app = test_app();
    let (token, id) = app.signup("a@x.com", "secret1").await;
    app.create_post(&token, "one", false).await;
    app.create_post(&token, "two", true).await;

    let (status, body) = app
        .send(Method::POST, "/api/v1/user/userinfo", None, Some(json!({ "id": id })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["postCount"], 2);
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("password_hash").is_none());

    let (status, _) = app
        .send(Method::POST, "/api/v1/user/userinfo", None, Some(json!({ "id": Uuid::new_v4() })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_update_is_partial() {
    let app = test_app();
    let (token, _) = app.signup("a@x.com", "secret1").await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v1/user/auth/update",
            Some(&token),
            Some(json!({ "name": "New Name" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "New Name");
    assert_eq!(body["user"]["email"], "a@x.com");

    // The old password still works because it was not part of the patch.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/user/signin",
            None,
            Some(json!({ "email": "a@x.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_password_change_is_rehashed() {
    let app = test_app();
    let (token, _) = app.signup("a@x.com", "secret1").await;

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/user/auth/update",
            Some(&token),
            Some(json!({ "password": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (old, _) = app
        .send(
            Method::POST,
            "/api/v1/user/signin",
            None,
            Some(json!({ "email": "a@x.com", "password": "secret1" })),
        )
        .await;
    let (new, _) = app
        .send(
            Method::POST,
            "/api/v1/user/signin",
            None,
            Some(json!({ "email": "a@x.com", "password": "secret2" })),
        )
        .await;
    assert_eq!(old, StatusCode::UNAUTHORIZED);
    assert_eq!(new, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_update_conflicts_and_ownership() {
    let app = test_app();
    let (token, _) = app.signup("a@x.com", "secret1").await;
    let (_, other) = app.signup("b@x.com", "secret1").await;

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/user/auth/update",
            Some(&token),
            Some(json!({ "email": "b@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/user/auth/update",
            Some(&token),
            Some(json!({ "id": other, "name": "Hijack" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app
        .send(Method::POST, "/api/v1/user/userinfo", None, Some(json!({ "id": other })))
        .await;
    assert_eq!(body["user"]["name"], "Tester");
}

// --- Cascading Account Delete ---

#[tokio::test]
async fn test_account_delete_cascades_to_posts() {
    let app = test_app();
    let (token, id) = app.signup("a@x.com", "secret1").await;
    let (other_token, other) = app.signup("b@x.com", "secret1").await;
    app.create_post(&token, "one", true).await;
    app.create_post(&token, "two", false).await;
    app.create_post(&token, "three", true).await;
    app.create_post(&other_token, "survivor", true).await;

    let (status, body) = app
        .send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({ "id": id })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["postsDeleted"], 3);
    assert!(!app.repo.account_exists(id));
    assert_eq!(app.repo.post_count(id), 0);
    assert_eq!(app.repo.post_count(other), 1);
    assert_eq!(app.bulk_titles().await, vec!["survivor".to_string()]);

    let (status, _) = app
        .send(Method::POST, "/api/v1/user/userinfo", None, Some(json!({ "id": id })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_account_delete_requires_own_id() {
    let app = test_app();
    let (token, id) = app.signup("a@x.com", "secret1").await;
    let (_, other) = app.signup("b@x.com", "secret1").await;

    let (status, _) = app
        .send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({ "id": other })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.repo.account_exists(id));
    assert!(app.repo.account_exists(other));
}

#[tokio::test]
async fn test_failed_account_delete_rolls_back_posts() {
    let app = test_app();
    let (token, id) = app.signup("a@x.com", "secret1").await;
    app.create_post(&token, "one", true).await;
    app.create_post(&token, "two", false).await;

    app.repo.set_fail_account_delete(true);
    let (status, body) = app
        .send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({ "id": id })))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["msg"], "Internal server error");
    assert!(app.repo.account_exists(id));
    assert_eq!(app.repo.post_count(id), 2);
    assert_eq!(app.bulk_titles().await, vec!["one".to_string()]);

    app.repo.set_fail_account_delete(false);
    let (status, body) = app
        .send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({ "id": id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["postsDeleted"], 2);
}

#[tokio::test]
async fn test_token_of_deleted_account_still_verifies_but_finds_nothing() {
    let app = test_app();
    let (token, id) = app.signup("a@x.com", "secret1").await;
    let post = app.create_post(&token, "gone", true).await;

    app.send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({ "id": id })))
        .await;

    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/blog/{post}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_of_deleted_account_cannot_create_posts() {
    let app = test_app();
    let (token, id) = app.signup("a@x.com", "secret1").await;

    let (status, _) = app
        .send(Method::DELETE, "/api/v1/user/auth/delete", Some(&token), Some(json!({ "id": id })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/blog",
            Some(&token),
            Some(json!({ "title": "orphan", "content": "c", "published": true })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "User not found");
    assert_eq!(app.repo.post_count(id), 0);
    assert!(app.bulk_titles().await.is_empty());
}
