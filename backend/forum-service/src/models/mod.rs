/// Data models for forum-service
///
/// This module defines structures for:
/// - Post: forum posts with an aggregated vote rating and comment counter
/// - Comment: threaded, soft-deletable comments on posts
/// - Vote: a single voter's current up/down vote on a post or comment
/// - Pagination: cursors, store pages and client-facing connections
mod comment;
mod post;

pub use comment::{Comment, CommentEvent, CommentId, CommentVote, CreateCommentInput, UpdateCommentInput};
pub use post::{
    CreatePostInput, PageInfo, Post, PostConnection, PostEdge, PostId, PostRatingCursor,
    PostTimeCursor, PostVote, PostsPage, PostsQuery, SortOrder, UpdatePostInput,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a single vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    /// Signed contribution of this vote to a rating
    pub fn as_i32(self) -> i32 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }

    /// Parse the wire representation (`1` / `-1`)
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(VoteValue::Up),
            -1 => Some(VoteValue::Down),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        self.as_i32() as i16
    }
}

/// A voter's vote as submitted by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: Uuid,
    pub value: VoteValue,
}
