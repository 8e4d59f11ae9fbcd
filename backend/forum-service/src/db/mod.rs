/// Database access layer
///
/// This module provides:
/// - The `Storage` contract every content store implements
/// - `InMemoryStorage`: the reference implementation behind a single RwLock
/// - `PgStorage`: the PostgreSQL implementation with the same observable semantics
/// - The vote ledger shared by both
pub mod memory;
pub mod postgres;
pub mod vote_ledger;

pub use memory::InMemoryStorage;
pub use postgres::PgStorage;
pub use vote_ledger::{resolve_vote, VoteChange, VoteLedger};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Comment, CommentId, CommentVote, CreateCommentInput, CreatePostInput, Post, PostId,
    PostRatingCursor, PostTimeCursor, PostVote, PostsPage, UpdateCommentInput, UpdatePostInput,
};

/// Content store contract.
///
/// Every mutating call is atomic: vote, rating and counter changes made by one
/// call are never observable half-applied. Known violations are reported with
/// the precise domain error (`PostNotFound`, `CommentDeleted`, ...); anything
/// else is an internal failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_post(&self, input: CreatePostInput) -> Result<Post>;

    async fn get_post(&self, id: PostId) -> Result<Post>;

    async fn update_post(&self, input: UpdatePostInput) -> Result<Post>;

    /// Hard delete of the post and its votes
    async fn delete_post(&self, id: PostId) -> Result<()>;

    async fn set_comments_restricted(&self, id: PostId, restricted: bool) -> Result<Post>;

    async fn vote_post(&self, vote: PostVote) -> Result<Post>;

    /// Posts ordered by (rating DESC, id DESC), starting after `cursor`
    async fn get_posts_sorted_by_rating(
        &self,
        limit: usize,
        cursor: Option<PostRatingCursor>,
    ) -> Result<PostsPage>;

    /// Posts ordered by (created_at, id), both descending when `newest_first`
    async fn get_posts_sorted_by_time(
        &self,
        limit: usize,
        cursor: Option<PostTimeCursor>,
        newest_first: bool,
    ) -> Result<PostsPage>;

    async fn create_comment(&self, input: CreateCommentInput) -> Result<Comment>;

    async fn update_comment_if_not_deleted(&self, input: UpdateCommentInput) -> Result<Comment>;

    /// Soft delete. Deleting an already deleted comment is a no-op.
    async fn delete_comment(&self, id: CommentId) -> Result<()>;

    async fn vote_comment_if_not_deleted(&self, vote: CommentVote) -> Result<Comment>;

    async fn get_comment(&self, id: CommentId) -> Result<Comment>;

    /// All comments of a post in creation order, soft-deleted ones included
    async fn get_post_comments(&self, post_id: PostId) -> Result<Vec<Comment>>;

    /// Release backing resources
    async fn close(&self);
}
