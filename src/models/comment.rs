use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::sanitize::{GraphWalker, Sanitize};

/// A comment on a post. Removed together with its post.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub commenter_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub commenter_id: Uuid,
    pub content: String,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

impl Sanitize for CreateCommentRequest {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.text(&mut self.content);
    }
}
