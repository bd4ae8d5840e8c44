use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::sanitize::{GraphWalker, Sanitize};

/// A blog post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a post. The author comes from the token, never
/// from the client.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

impl Sanitize for CreatePostRequest {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.text(&mut self.title);
        walker.text(&mut self.content);
    }
}

impl CreatePostRequest {
    pub fn into_new_post(self, author_id: Uuid) -> NewPost {
        NewPost {
            title: self.title,
            content: self.content,
            author_id,
        }
    }
}

/// DTO for updating a post. `None` means "don't update this field".
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: Option<String>,
}

impl Sanitize for UpdatePostRequest {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.optional_text(&mut self.title);
        walker.optional_text(&mut self.content);
    }
}

impl UpdatePostRequest {
    /// Applies the present fields to `post` and bumps `updated_at`.
    pub fn apply_to(self, post: &mut Post, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        post.updated_at = now;
    }
}

/// What the API returns for a post.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        PostResponse {
            id: post.id,
            title: post.title,
            content: post.content,
            author_id: post.author_id,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::InputSanitizer;

    #[test]
    fn create_request_is_sanitized_before_mapping() {
        let mut request = CreatePostRequest {
            title: "Hello <script>alert('XSS')</script> World".to_string(),
            content: "<p>Body</p><iframe src='http://evil.com'></iframe>".to_string(),
        };
        InputSanitizer::default().sanitize_object(&mut request).unwrap();

        let author = Uuid::new_v4();
        let post = request.into_new_post(author);

        assert!(!post.title.contains("<script>"));
        assert!(post.title.contains("Hello"));
        assert_eq!(post.content, "<p>Body</p>");
        assert_eq!(post.author_id, author);
    }

    #[test]
    fn update_request_only_touches_present_fields() {
        let created = Utc::now();
        let mut post = Post {
            id: 1,
            title: "Old".to_string(),
            content: "Body".to_string(),
            author_id: Uuid::new_v4(),
            created_at: created,
            updated_at: created,
        };
        let later = created + chrono::Duration::minutes(5);

        UpdatePostRequest {
            title: Some("New".to_string()),
            content: None,
        }
        .apply_to(&mut post, later);

        assert_eq!(post.title, "New");
        assert_eq!(post.content, "Body");
        assert_eq!(post.updated_at, later);
        assert_eq!(post.created_at, created);
    }

    #[test]
    fn title_length_is_limited() {
        let request = CreatePostRequest {
            title: "t".repeat(201),
            content: "c".to_string(),
        };
        assert!(request.validate().is_err());

        let request = CreatePostRequest {
            title: String::new(),
            content: "c".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
