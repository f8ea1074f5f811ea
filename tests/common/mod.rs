// Shared scaffolding for the router-level test suites. Not every suite uses every helper.
#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use inkpost::{AppConfig, AppState, InMemoryRepository, TokenService, create_router};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// A router wired to an in-memory store that the test can still inspect directly.
pub struct TestApp {
    pub router: Router,
    pub repo: InMemoryRepository,
    pub config: AppConfig,
}

pub fn test_app() -> TestApp {
    test_app_with(AppConfig::default())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let repo = InMemoryRepository::new();
    let state = AppState::new(Arc::new(repo.clone()), config.clone());
    TestApp {
        router: create_router(state),
        repo,
        config,
    }
}

impl TestApp {
    /// Sends one request through the full middleware stack and returns the status with the
    /// JSON body (`Value::Null` when the body is empty or not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Signs up a fresh account and returns its token together with its id.
    pub async fn signup(&self, email: &str, password: &str) -> (String, Uuid) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/user/signup",
                None,
                Some(json!({ "email": email, "password": password, "name": "Tester" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        let token = body["jwt"].as_str().unwrap().to_string();
        let id = self.identity_of(&token);
        (token, id)
    }

    pub fn identity_of(&self, token: &str) -> Uuid {
        TokenService::from_config(&self.config)
            .authenticate(token)
            .unwrap()
            .id
    }

    /// Creates a post as `token` and returns its id.
    pub async fn create_post(&self, token: &str, title: &str, published: bool) -> Uuid {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/blog",
                Some(token),
                Some(json!({ "title": title, "content": "body text", "published": published })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn bulk_titles(&self) -> Vec<String> {
        let (status, body) = self.send(Method::GET, "/api/v1/blog/bulk", None, None).await;
        assert_eq!(status, StatusCode::OK);
        body["blogs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["title"].as_str().unwrap().to_string())
            .collect()
    }

    /// Signs arbitrary claims with this app's secret.
    pub fn craft_token(&self, claims: Value) -> String {
        craft_token(&self.config.jwt_secret, claims)
    }
}

pub fn craft_token(secret: &str, claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
