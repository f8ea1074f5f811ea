use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    lifecycle,
    models::{
        AccountDeletedResponse, AccountPatch, CreatePostRequest, DeleteAccountRequest,
        MessageResponse, NewAccount, PostIdResponse, PostListResponse, PostResponse,
        ProfileLookupRequest, ProfileResponse, ProfileView, PublishRequest, SigninRequest,
        SignupRequest, TokenResponse, UpdatePostRequest, UpdateProfileRequest,
    },
    validation::{IdPath, ValidatedJson},
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    state.tokens.issue(user_id).map_err(|_| ApiError::Internal)
}

// --- Account Handlers ---

/// signup
///
/// [Public Route] Creates an account and returns a session token for it.
/// The email must not belong to an existing account.
#[utoipa::path(
    post,
    path = "/api/v1/user/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Signed up", body = TokenResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    if state.repo.find_account_by_email(&req.email).await?.is_some() {
        tracing::warn!("signup rejected: email already registered");
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = state.hasher.hash(&req.password)?;
    // The store enforces uniqueness too, so a concurrent signup still ends in a 409.
    let account = state
        .repo
        .create_account(NewAccount {
            email: req.email,
            password_hash,
            name: req.name.filter(|name| !name.trim().is_empty()),
        })
        .await?;

    let jwt = issue_token(&state, account.id)?;
    tracing::info!(account_id = %account.id, "account created");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            msg: "User signed up successfully".to_string(),
            jwt,
        }),
    ))
}

/// signin
///
/// [Public Route] Exchanges email and password for a session token.
#[utoipa::path(
    post,
    path = "/api/v1/user/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "No such user")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SigninRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account = state
        .repo
        .find_account_by_email(&req.email)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    if !state.hasher.verify(&req.password, &account.password_hash) {
        tracing::warn!(account_id = %account.id, "signin rejected: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    Ok(Json(TokenResponse {
        msg: "User signed in successfully".to_string(),
        jwt: issue_token(&state, account.id)?,
    }))
}

/// get_profile
///
/// [Public Route] Returns the public profile of the account named in the body,
/// including how many posts it owns.
#[utoipa::path(
    post,
    path = "/api/v1/user/userinfo",
    request_body = ProfileLookupRequest,
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ProfileLookupRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let account = state
        .repo
        .find_account(req.id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    let post_count = state.repo.count_posts_by_author(account.id).await?;

    Ok(Json(ProfileResponse {
        msg: "User fetched successfully".to_string(),
        user: ProfileView::new(&account, post_count),
    }))
}

/// update_profile
///
/// [Authenticated Route] Partially updates the caller's own account. Only the fields
/// present in the body change; a new password is re-hashed before it is stored.
#[utoipa::path(
    put,
    path = "/api/v1/user/auth/update",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = ProfileResponse),
        (status = 403, description = "Body id is not the caller"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_profile(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if req.id.is_some_and(|id| id != user.id) {
        return Err(ApiError::Forbidden);
    }

    let mut account = state
        .repo
        .find_account(user.id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    let password_hash = match req.password.as_deref() {
        Some(password) => Some(state.hasher.hash(password)?),
        None => None,
    };
    let patch = AccountPatch {
        name: req.name,
        email: req.email,
        password_hash,
    };

    if !patch.is_empty() {
        patch.apply(&mut account);
        account = state.repo.update_account(&account).await?;
        tracing::info!(account_id = %account.id, "profile updated");
    }

    let post_count = state.repo.count_posts_by_author(account.id).await?;
    Ok(Json(ProfileResponse {
        msg: "User updated successfully".to_string(),
        user: ProfileView::new(&account, post_count),
    }))
}

/// delete_account
///
/// [Authenticated Route] Deletes the caller's account together with all of its posts,
/// atomically. The body must name the caller's own id.
#[utoipa::path(
    delete,
    path = "/api/v1/user/auth/delete",
    request_body = DeleteAccountRequest,
    responses(
        (status = 200, description = "Deleted", body = AccountDeletedResponse),
        (status = 400, description = "Missing id"),
        (status = 403, description = "Body id is not the caller"),
        (status = 500, description = "Transaction failed")
    )
)]
pub async fn delete_account(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DeleteAccountRequest>,
) -> Result<Json<AccountDeletedResponse>, ApiError> {
    if req.id != user.id {
        return Err(ApiError::Forbidden);
    }

    let posts_deleted = lifecycle::delete_account(state.repo.as_ref(), user.id).await?;
    Ok(Json(AccountDeletedResponse {
        msg: "User deleted successfully".to_string(),
        posts_deleted,
    }))
}

// --- Blog Handlers ---

/// create_post
///
/// [Authenticated Route] Creates a post owned by the caller. Drafts by default.
#[utoipa::path(
    post,
    path = "/api/v1/blog",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostIdResponse),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostIdResponse>), ApiError> {
    let post = lifecycle::create_post(state.repo.as_ref(), &user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(PostIdResponse {
            msg: "Blog created successfully".to_string(),
            id: post.id,
        }),
    ))
}

/// update_post
///
/// [Authenticated Route] Patches title, content or published state of the caller's post.
#[utoipa::path(
    put,
    path = "/api/v1/blog",
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = PostIdResponse),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UpdatePostRequest>,
) -> Result<Json<PostIdResponse>, ApiError> {
    let (id, patch) = req.into_patch();
    let post = lifecycle::update_post(state.repo.as_ref(), &user, id, patch).await?;
    Ok(Json(PostIdResponse {
        msg: "Blog updated successfully".to_string(),
        id: post.id,
    }))
}

/// publish_post
///
/// [Authenticated Route] Moves the caller's post between draft and published.
#[utoipa::path(
    put,
    path = "/api/v1/blog/publish",
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Publish state changed", body = PostResponse),
        (status = 400, description = "Invalid shape"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn publish_post(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PublishRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let blog = lifecycle::set_published(state.repo.as_ref(), &user, req.id, req.published).await?;
    let msg = if blog.published {
        "Blog published successfully"
    } else {
        "Blog unpublished successfully"
    };
    Ok(Json(PostResponse {
        msg: msg.to_string(),
        blog,
    }))
}

/// list_posts
///
/// [Listing Route] Every published post, newest first, with its author summary.
#[utoipa::path(
    get,
    path = "/api/v1/blog/bulk",
    responses((status = 200, description = "Published posts", body = PostListResponse))
)]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<PostListResponse>, ApiError> {
    let blogs = state.repo.list_posts(true).await?;
    Ok(Json(PostListResponse {
        msg: "Blogs fetched successfully".to_string(),
        blogs,
    }))
}

/// get_post
///
/// [Authenticated Route] Direct lookup by id; drafts are returned as well.
#[utoipa::path(
    get,
    path = "/api/v1/blog/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_post(
    _user: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<PostResponse>, ApiError> {
    let blog = state
        .repo
        .find_post_view(id)
        .await?
        .ok_or(ApiError::NotFound("Blog not found"))?;
    Ok(Json(PostResponse {
        msg: "Blog fetched successfully".to_string(),
        blog,
    }))
}

/// list_author_posts
///
/// [Listing Route] Posts by one author. Drafts are included only when the identified
/// caller is that author. An author with nothing visible yields 404.
#[utoipa::path(
    get,
    path = "/api/v1/blog/author/{id}",
    params(("id" = Uuid, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Posts by author", body = PostListResponse),
        (status = 404, description = "None found")
    )
)]
pub async fn list_author_posts(
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
    IdPath(author_id): IdPath,
) -> Result<Json<PostListResponse>, ApiError> {
    let include_drafts = viewer.is_some_and(|v| v.id == author_id);
    let blogs = state
        .repo
        .list_posts_by_author(author_id, include_drafts)
        .await?;

    if blogs.is_empty() {
        return Err(ApiError::NotFound("No blogs found for this author"));
    }
    Ok(Json(PostListResponse {
        msg: "Blogs fetched successfully".to_string(),
        blogs,
    }))
}

/// delete_post
///
/// [Authenticated Route] Deletes the caller's post. Non-owners get 403 and nothing changes.
#[utoipa::path(
    delete,
    path = "/api/v1/blog/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<MessageResponse>, ApiError> {
    lifecycle::delete_post(state.repo.as_ref(), &user, id).await?;
    Ok(Json(MessageResponse {
        msg: "Blog deleted successfully".to_string(),
    }))
}
