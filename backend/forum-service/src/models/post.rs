use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Vote;

pub type PostId = i64;

/// Forum post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: PostId,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Sum of the current votes on this post
    pub rating: i32,
    /// Number of comments that are not soft-deleted
    pub comments_count: i32,
    pub comments_restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePostInput {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePostInput {
    pub id: PostId,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostVote {
    pub post_id: PostId,
    pub vote: Vote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    /// Highest rating first
    Rating,
    /// Newest first
    New,
    /// Oldest first
    Old,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsQuery {
    pub sort: SortOrder,
    pub limit: usize,
    pub cursor: Option<String>,
}

/// Position of the last post of a page in (created_at, id) order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostTimeCursor {
    pub time: DateTime<Utc>,
    pub id: PostId,
}

/// Position of the last post of a page in (rating, id) order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRatingCursor {
    pub rating: i32,
    pub id: PostId,
}

/// One page of posts as returned by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEdge {
    pub cursor: String,
    pub post: Post,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next: bool,
    pub end_cursor: Option<String>,
}

/// Client-facing page: edges with per-post cursors plus page info
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostConnection {
    pub edges: Vec<PostEdge>,
    pub page_info: PageInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_wire_names() {
        assert_eq!(serde_json::to_string(&SortOrder::Rating).unwrap(), "\"RATING\"");
        let sort: SortOrder = serde_json::from_str("\"OLD\"").unwrap();
        assert_eq!(sort, SortOrder::Old);
        assert!(serde_json::from_str::<SortOrder>("\"rating\"").is_err());
    }

    #[test]
    fn test_empty_connection_serializes_page_info() {
        let value = serde_json::to_value(PostConnection::default()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "edges": [],
                "page_info": { "has_next": false, "end_cursor": null }
            })
        );
    }
}
