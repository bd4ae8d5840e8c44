// src/store/mod.rs

//! Persistence interfaces.
//!
//! Handlers only see the repository traits. Two backends implement them:
//! Postgres through `sqlx` for deployments, and an in-memory store used by the
//! tests and when no `DATABASE_URL` is configured.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    comment::{Comment, NewComment},
    post::{NewPost, Post},
    user::{NewUser, Role, User},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug)]
pub enum StoreError {
    /// The row addressed by an update does not exist.
    NotFound,
    /// A unique column already holds the value. Carries the column name.
    Conflict(&'static str),
    /// The backend failed (connection, query, decoding).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => f.write_str("record not found"),
            StoreError::Conflict(column) => write!(f, "duplicate value for '{column}'"),
            StoreError::Backend(msg) => write!(f, "storage backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Case-insensitive.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Looks the value up as an email first, then as a username.
    async fn find_by_email_or_username(&self, value: &str) -> StoreResult<Option<User>> {
        match self.find_by_email(value).await? {
            Some(user) => Ok(Some(user)),
            None => self.find_by_username(value).await,
        }
    }

    /// Inserts a user. Fails with `Conflict("email")` or `Conflict("username")`
    /// on duplicates.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Persists every mutable column of `user`.
    async fn update(&self, user: &User) -> StoreResult<User>;

    /// All users, optionally restricted to one role, oldest first.
    async fn list(&self, role: Option<Role>) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait PostRepository: Send + Sync + 'static {
    /// Newest first.
    async fn list(&self) -> StoreResult<Vec<Post>>;

    async fn find(&self, id: i64) -> StoreResult<Option<Post>>;

    async fn create(&self, post: NewPost) -> StoreResult<Post>;

    async fn update(&self, post: &Post) -> StoreResult<Post>;

    /// Removes the post and its comments. Returns `false` when it did not
    /// exist.
    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync + 'static {
    /// Oldest first.
    async fn list_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>>;

    async fn create(&self, comment: NewComment) -> StoreResult<Comment>;
}

/// The repositories a running application talks to.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
}

impl Repositories {
    pub fn memory() -> Self {
        Self::from_backend(MemoryStore::new())
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_backend(PgStore::new(pool))
    }

    fn from_backend<B>(backend: B) -> Self
    where
        B: UserRepository + PostRepository + CommentRepository + Clone,
    {
        Repositories {
            users: Arc::new(backend.clone()),
            posts: Arc::new(backend.clone()),
            comments: Arc::new(backend),
        }
    }
}
