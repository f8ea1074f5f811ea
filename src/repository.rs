use crate::models::{Account, AuthorSummary, NewAccount, NewPost, Post, PostView};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepoError
///
/// Storage-level failures. `Conflict` is the only variant a caller is expected to act on;
/// everything else is an infrastructure problem that becomes a 500.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

// Postgres unique violations carry SQLSTATE 23505; the only unique key besides the
// primary keys is `accounts.email`.
impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepoError::Conflict("Email already in use".to_string());
            }
        }
        RepoError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The data-access contract covering both the credential store (accounts) and the
/// content store (posts). Handlers and the lifecycle layer only ever see
/// `Arc<dyn Repository>`, so Postgres and the in-memory store are interchangeable.
///
/// Every method touches exactly one entity, except the unit of work opened by `begin`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    /// Fails with `RepoError::Conflict` when the email is taken.
    async fn create_account(&self, account: NewAccount) -> RepoResult<Account>;
    async fn find_account(&self, id: Uuid) -> RepoResult<Option<Account>>;
    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>>;
    /// Overwrites the stored row with `account`. `Conflict` on a duplicate email.
    async fn update_account(&self, account: &Account) -> RepoResult<Account>;

    // --- Posts ---
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    async fn find_post(&self, id: Uuid) -> RepoResult<Option<Post>>;
    async fn find_post_view(&self, id: Uuid) -> RepoResult<Option<PostView>>;
    /// Update-by-id of title, content and published. `author_id`/`created_at` are ignored.
    async fn update_post(&self, post: &Post) -> RepoResult<Post>;
    /// Returns false when no row matched.
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool>;
    /// Newest first. With `published_only` drafts are filtered out.
    async fn list_posts(&self, published_only: bool) -> RepoResult<Vec<PostView>>;
    async fn list_posts_by_author(
        &self,
        author_id: Uuid,
        include_drafts: bool,
    ) -> RepoResult<Vec<PostView>>;
    async fn count_posts_by_author(&self, author_id: Uuid) -> RepoResult<i64>;

    // --- Unit of Work ---
    /// Opens the transaction used for the account deletion cascade.
    async fn begin(&self) -> RepoResult<Box<dyn AccountTransaction>>;
}

/// AccountTransaction
///
/// The multi-entity unit of work. Nothing staged through it is visible until `commit`
/// succeeds; `rollback` (or dropping it uncommitted) discards every staged change.
#[async_trait]
pub trait AccountTransaction: Send {
    async fn delete_posts_by_author(&mut self, author_id: Uuid) -> RepoResult<u64>;
    /// Returns false when the account does not exist.
    async fn delete_account(&mut self, id: Uuid) -> RepoResult<bool>;
    async fn commit(self: Box<Self>) -> RepoResult<()>;
    async fn rollback(self: Box<Self>) -> RepoResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A `posts` row joined with its author. Flattened into `PostView`.
#[derive(FromRow)]
struct PostWithAuthorRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    content: String,
    published: bool,
    created_at: DateTime<Utc>,
    author_name: Option<String>,
    author_email: String,
}

impl From<PostWithAuthorRow> for PostView {
    fn from(row: PostWithAuthorRow) -> Self {
        PostView {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            content: row.content,
            published: row.published,
            created_at: row.created_at,
            author: AuthorSummary {
                id: row.author_id,
                name: row.author_name,
                email: row.author_email,
            },
        }
    }
}

const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.author_id, p.title, p.content, p.published, p.created_at,
           a.name AS author_name, a.email AS author_email
    FROM posts p
    JOIN accounts a ON a.id = p.author_id
"#;

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_account(&self, account: NewAccount) -> RepoResult<Account> {
        let created = sqlx::query_as::<_, Account>(
            r#"INSERT INTO accounts (id, email, password_hash, name)
               VALUES ($1, $2, $3, $4)
               RETURNING id, email, password_hash, name"#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_account(&self, id: Uuid) -> RepoResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, name FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, name FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_account(&self, account: &Account) -> RepoResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"UPDATE accounts
               SET email = $2, password_hash = $3, name = $4
               WHERE id = $1
               RETURNING id, email, password_hash, name"#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::Storage(format!("account {} vanished during update", account.id)))
    }

    /// create_post
    ///
    /// `created_at` is taken from the database clock so it is consistent across replicas.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let created = sqlx::query_as::<_, Post>(
            r#"INSERT INTO posts (id, author_id, title, content, published, created_at)
               VALUES ($1, $2, $3, $4, $5, NOW())
               RETURNING id, author_id, title, content, published, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.published)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, author_id, title, content, published, created_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn find_post_view(&self, id: Uuid) -> RepoResult<Option<PostView>> {
        let row = sqlx::query_as::<_, PostWithAuthorRow>(&format!(
            "{POST_VIEW_SELECT} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PostView::from))
    }

    async fn update_post(&self, post: &Post) -> RepoResult<Post> {
        sqlx::query_as::<_, Post>(
            r#"UPDATE posts
               SET title = $2, content = $3, published = $4
               WHERE id = $1
               RETURNING id, author_id, title, content, published, created_at"#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.published)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::Storage(format!("post {} vanished during update", post.id)))
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_posts(&self, published_only: bool) -> RepoResult<Vec<PostView>> {
        let rows = sqlx::query_as::<_, PostWithAuthorRow>(&format!(
            "{POST_VIEW_SELECT} WHERE ($1 = false OR p.published = true) ORDER BY p.created_at DESC"
        ))
        .bind(published_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn list_posts_by_author(
        &self,
        author_id: Uuid,
        include_drafts: bool,
    ) -> RepoResult<Vec<PostView>> {
        let rows = sqlx::query_as::<_, PostWithAuthorRow>(&format!(
            "{POST_VIEW_SELECT} WHERE p.author_id = $1 AND ($2 = true OR p.published = true) \
             ORDER BY p.created_at DESC"
        ))
        .bind(author_id)
        .bind(include_drafts)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn count_posts_by_author(&self, author_id: Uuid) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn begin(&self) -> RepoResult<Box<dyn AccountTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAccountTransaction { tx }))
    }
}

/// PgAccountTransaction
///
/// Wraps a live `sqlx::Transaction`. sqlx rolls the transaction back when it is dropped
/// without `commit`, which covers early returns on `?`.
struct PgAccountTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountTransaction for PgAccountTransaction {
    async fn delete_posts_by_author(&mut self, author_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM posts WHERE author_id = $1")
            .bind(author_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_account(&mut self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
