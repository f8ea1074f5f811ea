use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

use crate::{
    models::{Account, AuthorSummary, NewAccount, NewPost, Post, PostView},
    repository::{AccountTransaction, RepoError, RepoResult, Repository},
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    posts: HashMap<Uuid, Post>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.accounts
            .values()
            .any(|a| a.email == email && Some(a.id) != except)
    }

    fn view(&self, post: &Post) -> Option<PostView> {
        let author = self.accounts.get(&post.author_id)?;
        Some(PostView::new(
            post.clone(),
            AuthorSummary {
                id: author.id,
                name: author.name.clone(),
                email: author.email.clone(),
            },
        ))
    }

    fn views<'a>(&self, posts: impl Iterator<Item = &'a Post>) -> Vec<PostView> {
        let mut views: Vec<PostView> = posts.filter_map(|p| self.view(p)).collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used when no `DATABASE_URL` is
/// configured in local mode and as the backing store for the test suite.
///
/// `fail_account_delete` makes the account-deletion step of a transaction error out, so
/// tests can observe the rollback of an already staged post deletion.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
    fail_account_delete: Arc<AtomicBool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_account_delete(&self, fail: bool) {
        self.fail_account_delete.store(fail, Ordering::SeqCst);
    }

    /// Number of posts authored by `author_id`, drafts included. Test helper.
    pub fn post_count(&self, author_id: Uuid) -> usize {
        self.tables
            .read()
            .map(|t| t.posts.values().filter(|p| p.author_id == author_id).count())
            .unwrap_or(0)
    }

    pub fn account_exists(&self, id: Uuid) -> bool {
        self.tables
            .read()
            .map(|t| t.accounts.contains_key(&id))
            .unwrap_or(false)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> RepoResult<T> {
        let guard = self.tables.read().map_err(|_| poisoned())?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> RepoResult<T>) -> RepoResult<T> {
        let mut guard = self.tables.write().map_err(|_| poisoned())?;
        f(&mut guard)
    }
}

fn poisoned() -> RepoError {
    RepoError::Storage("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_account(&self, account: NewAccount) -> RepoResult<Account> {
        self.write(|t| {
            if t.email_taken(&account.email, None) {
                return Err(RepoError::Conflict("Email already in use".to_string()));
            }
            let created = Account {
                id: Uuid::new_v4(),
                email: account.email,
                password_hash: account.password_hash,
                name: account.name,
            };
            t.accounts.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn find_account(&self, id: Uuid) -> RepoResult<Option<Account>> {
        self.read(|t| t.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        self.read(|t| t.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn update_account(&self, account: &Account) -> RepoResult<Account> {
        self.write(|t| {
            if !t.accounts.contains_key(&account.id) {
                return Err(RepoError::Storage(format!(
                    "account {} vanished during update",
                    account.id
                )));
            }
            if t.email_taken(&account.email, Some(account.id)) {
                return Err(RepoError::Conflict("Email already in use".to_string()));
            }
            t.accounts.insert(account.id, account.clone());
            Ok(account.clone())
        })
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        self.write(|t| {
            // Mirrors the `posts.author_id` foreign key.
            if !t.accounts.contains_key(&post.author_id) {
                return Err(RepoError::Storage(format!(
                    "author {} does not exist",
                    post.author_id
                )));
            }
            let created = Post {
                id: Uuid::new_v4(),
                author_id: post.author_id,
                title: post.title,
                content: post.content,
                published: post.published,
                created_at: Utc::now(),
            };
            t.posts.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn find_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        self.read(|t| t.posts.get(&id).cloned())
    }

    async fn find_post_view(&self, id: Uuid) -> RepoResult<Option<PostView>> {
        self.read(|t| t.posts.get(&id).and_then(|p| t.view(p)))
    }

    async fn update_post(&self, post: &Post) -> RepoResult<Post> {
        self.write(|t| {
            let stored = t.posts.get_mut(&post.id).ok_or_else(|| {
                RepoError::Storage(format!("post {} vanished during update", post.id))
            })?;
            stored.title = post.title.clone();
            stored.content = post.content.clone();
            stored.published = post.published;
            Ok(stored.clone())
        })
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        self.write(|t| Ok(t.posts.remove(&id).is_some()))
    }

    async fn list_posts(&self, published_only: bool) -> RepoResult<Vec<PostView>> {
        self.read(|t| t.views(t.posts.values().filter(|p| !published_only || p.published)))
    }

    async fn list_posts_by_author(
        &self,
        author_id: Uuid,
        include_drafts: bool,
    ) -> RepoResult<Vec<PostView>> {
        self.read(|t| {
            t.views(
                t.posts
                    .values()
                    .filter(|p| p.author_id == author_id && (include_drafts || p.published)),
            )
        })
    }

    async fn count_posts_by_author(&self, author_id: Uuid) -> RepoResult<i64> {
        self.read(|t| t.posts.values().filter(|p| p.author_id == author_id).count() as i64)
    }

    async fn begin(&self) -> RepoResult<Box<dyn AccountTransaction>> {
        Ok(Box::new(MemoryAccountTransaction {
            tables: Arc::clone(&self.tables),
            fail_account_delete: self.fail_account_delete.load(Ordering::SeqCst),
            staged: Vec::new(),
        }))
    }
}

enum StagedOp {
    /// The exact post ids counted when the step was staged.
    DeletePosts { author_id: Uuid, ids: HashSet<Uuid> },
    DeleteAccount(Uuid),
}

/// MemoryAccountTransaction
///
/// Stages operations and applies them all under a single write lock on commit.
/// Dropping it without committing discards the staged operations.
///
/// Commit fails without touching anything if an author gained or lost posts after their
/// deletion was staged, so the reported count is always the number actually removed.
struct MemoryAccountTransaction {
    tables: Arc<RwLock<Tables>>,
    fail_account_delete: bool,
    staged: Vec<StagedOp>,
}

#[async_trait]
impl AccountTransaction for MemoryAccountTransaction {
    async fn delete_posts_by_author(&mut self, author_id: Uuid) -> RepoResult<u64> {
        let ids: HashSet<Uuid> = {
            let t = self.tables.read().map_err(|_| poisoned())?;
            t.posts
                .values()
                .filter(|p| p.author_id == author_id)
                .map(|p| p.id)
                .collect()
        };
        let count = ids.len() as u64;
        self.staged.push(StagedOp::DeletePosts { author_id, ids });
        Ok(count)
    }

    async fn delete_account(&mut self, id: Uuid) -> RepoResult<bool> {
        if self.fail_account_delete {
            return Err(RepoError::Storage("simulated account delete failure".to_string()));
        }
        let exists = {
            let t = self.tables.read().map_err(|_| poisoned())?;
            t.accounts.contains_key(&id)
        };
        if exists {
            self.staged.push(StagedOp::DeleteAccount(id));
        }
        Ok(exists)
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;

        for op in &self.staged {
            if let StagedOp::DeletePosts { author_id, ids } = op {
                let current: HashSet<Uuid> = t
                    .posts
                    .values()
                    .filter(|p| p.author_id == *author_id)
                    .map(|p| p.id)
                    .collect();
                if current != *ids {
                    return Err(RepoError::Storage(format!(
                        "posts of {author_id} changed during the transaction"
                    )));
                }
            }
        }

        for op in self.staged {
            match op {
                StagedOp::DeletePosts { ids, .. } => {
                    t.posts.retain(|id, _| !ids.contains(id));
                }
                StagedOp::DeleteAccount(id) => {
                    t.accounts.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        Ok(())
    }
}
