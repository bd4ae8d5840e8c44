//! In-memory storage backend.
//!
//! Non-persistent: all data is lost when the process exits. Used by the test
//! suite and for local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CommentRepository, PostRepository, StoreError, StoreResult, UserRepository};
use crate::models::{
    comment::{Comment, NewComment},
    post::{NewPost, Post},
    user::{NewUser, Role, User},
};

#[derive(Default)]
struct MemoryData {
    users: HashMap<Uuid, User>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    next_post_id: i64,
    next_comment_id: i64,
}

impl MemoryData {
    fn user_by(&self, matches: impl Fn(&User) -> bool) -> Option<User> {
        self.users.values().find(|user| matches(user)).cloned()
    }

    fn check_unique(&self, id: Uuid, email: &str, username: &str) -> StoreResult<()> {
        let others = || self.users.values().filter(move |user| user.id != id);
        if others().any(|user| user.email.eq_ignore_ascii_case(email)) {
            return Err(StoreError::Conflict("email"));
        }
        if others().any(|user| user.username.eq_ignore_ascii_case(username)) {
            return Err(StoreError::Conflict("username"));
        }
        Ok(())
    }
}

/// Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.data.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.user_by(|user| user.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.user_by(|user| user.username.eq_ignore_ascii_case(username)))
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut data = self.data.write().await;
        let id = Uuid::new_v4();
        data.check_unique(id, &new.email, &new.username)?;

        let user = User {
            id,
            email: new.email,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            photo: new.photo,
            date_of_birth: new.date_of_birth,
            password_hash: new.password_hash,
            role: new.role,
            super_admin: new.super_admin,
            email_confirmed: true,
            failed_login_count: 0,
            lockout_until: None,
            created_at: Utc::now(),
        };
        data.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        data.check_unique(user.id, &user.email, &user.username)?;
        data.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn list(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let data = self.data.read().await;
        let mut users: Vec<User> = data
            .users
            .values()
            .filter(|user| role.is_none_or(|role| user.role == role))
            .cloned()
            .collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Post>> {
        let data = self.data.read().await;
        // ids grow with insertion time, so reverse id order is newest first
        Ok(data.posts.values().rev().cloned().collect())
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Post>> {
        Ok(self.data.read().await.posts.get(&id).cloned())
    }

    async fn create(&self, new: NewPost) -> StoreResult<Post> {
        let mut data = self.data.write().await;
        data.next_post_id += 1;
        let now = Utc::now();
        let post = Post {
            id: data.next_post_id,
            title: new.title,
            content: new.content,
            author_id: new.author_id,
            created_at: now,
            updated_at: now,
        };
        data.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update(&self, post: &Post) -> StoreResult<Post> {
        let mut data = self.data.write().await;
        match data.posts.get_mut(&post.id) {
            Some(stored) => {
                *stored = post.clone();
                Ok(post.clone())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        if data.posts.remove(&id).is_none() {
            return Ok(false);
        }
        data.comments.retain(|_, comment| comment.post_id != id);
        Ok(true)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        let data = self.data.read().await;
        Ok(data
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create(&self, new: NewComment) -> StoreResult<Comment> {
        let mut data = self.data.write().await;
        if !data.posts.contains_key(&new.post_id) {
            return Err(StoreError::NotFound);
        }
        data.next_comment_id += 1;
        let comment = Comment {
            id: data.next_comment_id,
            post_id: new.post_id,
            commenter_id: new.commenter_id,
            content: new.content,
            created_at: Utc::now(),
        };
        data.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Repositories;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: None,
            photo: None,
            date_of_birth: None,
            password_hash: "hash".to_string(),
            role: Role::User,
            super_admin: false,
        }
    }

    fn new_post(author_id: Uuid, title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: "content".to_string(),
            author_id,
        }
    }

    #[tokio::test]
    async fn duplicate_email_and_username_conflict() {
        let repos = Repositories::memory();
        repos.users.create(new_user("a@x.com", "alice")).await.unwrap();

        let err = repos.users.create(new_user("A@X.com", "other")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict("email")));

        let err = repos.users.create(new_user("b@x.com", "ALICE")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict("username")));
    }

    #[tokio::test]
    async fn finds_by_email_or_username() {
        let repos = Repositories::memory();
        let user = repos.users.create(new_user("a@x.com", "alice")).await.unwrap();

        let by_email = repos.users.find_by_email_or_username("a@x.com").await.unwrap();
        let by_name = repos.users.find_by_email_or_username("Alice").await.unwrap();

        assert_eq!(by_email.map(|u| u.id), Some(user.id));
        assert_eq!(by_name.map(|u| u.id), Some(user.id));
        assert!(repos.users.find_by_email_or_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_users_by_role() {
        let repos = Repositories::memory();
        let mut admin = repos.users.create(new_user("a@x.com", "alice")).await.unwrap();
        repos.users.create(new_user("b@x.com", "bob")).await.unwrap();
        admin.role = Role::Admin;
        repos.users.update(&admin).await.unwrap();

        let admins = repos.users.list(Some(Role::Admin)).await.unwrap();
        let everyone = repos.users.list(None).await.unwrap();

        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "alice");
        assert_eq!(everyone.len(), 2);
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let repos = Repositories::memory();
        let author = Uuid::new_v4();
        repos.posts.create(new_post(author, "first")).await.unwrap();
        repos.posts.create(new_post(author, "second")).await.unwrap();

        let titles: Vec<String> = repos
            .posts
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.title)
            .collect();

        assert_eq!(titles, ["second", "first"]);
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_comments() {
        let repos = Repositories::memory();
        let author = Uuid::new_v4();
        let post = repos.posts.create(new_post(author, "p")).await.unwrap();
        repos
            .comments
            .create(NewComment {
                post_id: post.id,
                commenter_id: author,
                content: "c".to_string(),
            })
            .await
            .unwrap();

        assert!(repos.posts.delete(post.id).await.unwrap());
        assert!(!repos.posts.delete(post.id).await.unwrap());
        assert!(repos.comments.list_for_post(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn updating_a_missing_post_is_not_found() {
        let repos = Repositories::memory();
        let now = Utc::now();
        let ghost = Post {
            id: 42,
            title: "t".to_string(),
            content: "c".to_string(),
            author_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        let err = repos.posts.update(&ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
