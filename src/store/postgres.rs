//! Postgres storage backend.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate builds
//! without a live database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CommentRepository, PostRepository, StoreError, StoreResult, UserRepository};
use crate::models::{
    comment::{Comment, NewComment},
    post::{NewPost, Post},
    user::{NewUser, Role, User},
};

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, photo, date_of_birth, \
     password_hash, role, super_admin, email_confirmed, failed_login_count, lockout_until, \
     created_at";

const POST_COLUMNS: &str = "id, title, content, author_id, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, post_id, commenter_id, content, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // Postgres error code for unique violation is 23505
            if db_err.code().as_deref() == Some("23505") {
                let column = match db_err.constraint() {
                    Some(name) if name.contains("username") => "username",
                    _ => "email",
                };
                return StoreError::Conflict(column);
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Row shape of the 'users' table. `role` is stored as text.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    first_name: String,
    last_name: Option<String>,
    photo: Option<String>,
    date_of_birth: Option<NaiveDate>,
    password_hash: String,
    role: String,
    super_admin: bool,
    email_confirmed: bool,
    failed_login_count: i32,
    lockout_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(StoreError::Backend)?;
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            photo: row.photo,
            date_of_birth: row.date_of_birth,
            password_hash: row.password_hash,
            role,
            super_admin: row.super_admin,
            email_confirmed: row.email_confirmed,
            failed_login_count: row.failed_login_count,
            lockout_until: row.lockout_until,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            title: row.title,
            content: row.content,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    commenter_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            commenter_id: row.commenter_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

fn users_from_rows(rows: Vec<UserRow>) -> StoreResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users
                (id, email, username, first_name, last_name, photo, date_of_birth,
                 password_hash, role, super_admin, email_confirmed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.email)
            .bind(&new.username)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.photo)
            .bind(new.date_of_birth)
            .bind(&new.password_hash)
            .bind(new.role.as_str())
            .bind(new.super_admin)
            .fetch_one(&self.pool)
            .await?;
        User::try_from(row)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users SET
                email = $2, username = $3, first_name = $4, last_name = $5, photo = $6,
                date_of_birth = $7, password_hash = $8, role = $9, super_admin = $10,
                email_confirmed = $11, failed_login_count = $12, lockout_until = $13
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.photo)
            .bind(user.date_of_birth)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.super_admin)
            .bind(user.email_confirmed)
            .bind(user.failed_login_count)
            .bind(user.lockout_until)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        User::try_from(row)
    }

    async fn list(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.map(|role| role.as_str()))
            .fetch_all(&self.pool)
            .await?;
        users_from_rows(rows)
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn list(&self) -> StoreResult<Vec<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Post::from))
    }

    async fn create(&self, new: NewPost) -> StoreResult<Post> {
        let sql = format!(
            "INSERT INTO posts (title, content, author_id) VALUES ($1, $2, $3) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update(&self, post: &Post) -> StoreResult<Post> {
        let sql = format!(
            "UPDATE posts SET title = $2, content = $3, updated_at = $4 WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(row.into())
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        // comments go with the post through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn list_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn create(&self, new: NewComment) -> StoreResult<Comment> {
        let sql = format!(
            "INSERT INTO comments (post_id, commenter_id, content) VALUES ($1, $2, $3) \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(new.post_id)
            .bind(new.commenter_id)
            .bind(&new.content)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                // Postgres error code for foreign key violation is 23503
                let missing_post = matches!(
                    &err,
                    sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503")
                );
                if missing_post {
                    StoreError::NotFound
                } else {
                    StoreError::from(err)
                }
            })?;
        Ok(row.into())
    }
}
