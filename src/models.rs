use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Records (Mapped to Database) ---

/// Account
///
/// A row of the `accounts` table. Deliberately not `Serialize`: the password digest must
/// never reach a response body, so clients only ever see a `ProfileView`.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
}

/// Fields needed to insert an account. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
}

/// AccountPatch
///
/// Partial profile update. Each `Some` field overwrites the stored value, each `None`
/// leaves it untouched. The password is already hashed by the time it lands here.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }

    pub fn apply(self, account: &mut Account) {
        if let Some(name) = self.name {
            account.name = Some(name);
        }
        if let Some(email) = self.email {
            account.email = email;
        }
        if let Some(password_hash) = self.password_hash {
            account.password_hash = password_hash;
        }
    }
}

/// Post
///
/// A row of the `posts` table. `author_id` and `created_at` are fixed at creation;
/// `published` is the only switch between draft and public visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
}

/// PostPatch
///
/// Partial post update with the same merge rule as `AccountPatch`.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
}

impl PostPatch {
    pub fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(published) = self.published {
            post.published = published;
        }
    }
}

// --- Read Views (Output) ---

/// AuthorSummary
///
/// Denormalized author details attached to every post in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

/// PostView
///
/// A post joined with its author, as returned by listings and by-id lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

impl PostView {
    pub fn new(post: Post, author: AuthorSummary) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            published: post.published,
            created_at: post.created_at,
            author,
        }
    }
}

/// ProfileView
///
/// Public profile of an account together with the number of posts it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub post_count: i64,
}

impl ProfileView {
    pub fn new(account: &Account, post_count: i64) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            post_count,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    #[schema(example = "a@x.com")]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /user/userinfo`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProfileLookupRequest {
    pub id: Uuid,
}

/// UpdateProfileRequest
///
/// Every field is optional. `id`, when sent, must name the authenticated account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeleteAccountRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// UpdatePostRequest
///
/// Patch of an existing post; absent fields keep their stored values.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatePostRequest {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl UpdatePostRequest {
    pub fn into_patch(self) -> (Uuid, PostPatch) {
        (
            self.id,
            PostPatch {
                title: self.title,
                content: self.content,
                published: self.published,
            },
        )
    }
}

/// Body of `PUT /blog/publish`. `published` must be a JSON boolean.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublishRequest {
    pub id: Uuid,
    pub published: bool,
}

// --- Response Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub msg: String,
    pub jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostIdResponse {
    pub msg: String,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub msg: String,
    pub blog: PostView,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostListResponse {
    pub msg: String,
    pub blogs: Vec<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub msg: String,
    pub user: ProfileView,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletedResponse {
    pub msg: String,
    pub posts_deleted: u64,
}
