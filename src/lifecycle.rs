//! Content authorization and lifecycle.
//!
//! Per post: `Draft <-> Published -> Deleted`. Every transition other than creation loads
//! the post first and compares its `author_id` with the caller before anything is written.

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{CreatePostRequest, NewPost, Post, PostPatch, PostView},
    repository::{AccountTransaction, RepoError, Repository},
};

const POST_NOT_FOUND: &str = "Blog not found";

/// The ownership rule shared by update, publish toggle and delete.
pub fn ensure_owner(post: &Post, requester: &AuthUser) -> Result<(), ApiError> {
    if post.author_id == requester.id {
        Ok(())
    } else {
        tracing::warn!(post_id = %post.id, requester = %requester.id, "ownership check failed");
        Err(ApiError::Forbidden)
    }
}

/// Loads a post and checks the caller owns it. `NotFound` wins over `Forbidden`.
pub async fn load_owned_post(
    repo: &dyn Repository,
    post_id: Uuid,
    requester: &AuthUser,
) -> Result<Post, ApiError> {
    let post = repo
        .find_post(post_id)
        .await?
        .ok_or(ApiError::NotFound(POST_NOT_FOUND))?;
    ensure_owner(&post, requester)?;
    Ok(post)
}

/// create_post
///
/// The author is always the authenticated caller; drafts unless `published: true` is sent.
/// A token outlives a deleted account, so the author is looked up before anything is written.
pub async fn create_post(
    repo: &dyn Repository,
    author: &AuthUser,
    req: CreatePostRequest,
) -> Result<Post, ApiError> {
    if repo.find_account(author.id).await?.is_none() {
        tracing::warn!(author = %author.id, "post rejected: author account no longer exists");
        return Err(ApiError::NotFound("User not found"));
    }

    let post = repo
        .create_post(NewPost {
            author_id: author.id,
            title: req.title,
            content: req.content,
            published: req.published.unwrap_or(false),
        })
        .await?;
    tracing::info!(post_id = %post.id, author = %author.id, "post created");
    Ok(post)
}

pub async fn update_post(
    repo: &dyn Repository,
    requester: &AuthUser,
    post_id: Uuid,
    patch: PostPatch,
) -> Result<Post, ApiError> {
    let mut post = load_owned_post(repo, post_id, requester).await?;
    patch.apply(&mut post);
    Ok(repo.update_post(&post).await?)
}

pub async fn set_published(
    repo: &dyn Repository,
    requester: &AuthUser,
    post_id: Uuid,
    published: bool,
) -> Result<PostView, ApiError> {
    update_post(
        repo,
        requester,
        post_id,
        PostPatch {
            published: Some(published),
            ..PostPatch::default()
        },
    )
    .await?;
    tracing::info!(%post_id, published, "publish state changed");

    repo.find_post_view(post_id)
        .await?
        .ok_or(ApiError::NotFound(POST_NOT_FOUND))
}

pub async fn delete_post(
    repo: &dyn Repository,
    requester: &AuthUser,
    post_id: Uuid,
) -> Result<(), ApiError> {
    load_owned_post(repo, post_id, requester).await?;
    if !repo.delete_post(post_id).await? {
        return Err(ApiError::NotFound(POST_NOT_FOUND));
    }
    tracing::info!(%post_id, "post deleted");
    Ok(())
}

/// delete_account
///
/// Removes every post by the account and then the account, inside one transaction.
/// Returns the number of posts removed. On any failure the transaction is rolled back and
/// both the posts and the account stay in place.
pub async fn delete_account(repo: &dyn Repository, account_id: Uuid) -> Result<u64, ApiError> {
    let mut tx = repo.begin().await?;

    let outcome = async {
        let posts_deleted = tx.delete_posts_by_author(account_id).await?;
        let account_deleted = tx.delete_account(account_id).await?;
        Ok::<_, RepoError>((posts_deleted, account_deleted))
    }
    .await;

    match outcome {
        Ok((posts_deleted, true)) => {
            tx.commit().await?;
            tracing::info!(%account_id, posts_deleted, "account deleted");
            Ok(posts_deleted)
        }
        Ok((_, false)) => {
            rollback(tx).await;
            Err(ApiError::NotFound("User not found"))
        }
        Err(e) => {
            rollback(tx).await;
            Err(e.into())
        }
    }
}

async fn rollback(tx: Box<dyn AccountTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = %e, "rollback failed; relying on the store to discard the transaction");
    }
}
