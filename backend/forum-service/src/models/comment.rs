use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{PostId, Vote};

pub type CommentId = i64;

/// Comment on a post. `text == None` marks a soft-deleted comment; the row is
/// kept so replies keep their place in the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: Uuid,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub rating: i32,
    pub parent_id: Option<CommentId>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.text.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommentInput {
    pub post_id: PostId,
    pub author_id: Uuid,
    pub text: String,
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCommentInput {
    pub id: CommentId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentVote {
    pub comment_id: CommentId,
    pub vote: Vote,
}

/// Payload delivered to live subscribers of a post
pub type CommentEvent = Comment;
