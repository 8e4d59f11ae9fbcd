/// Comment service - threaded comments, voting and the live comment feed
use std::sync::Arc;
use std::time::Duration;

use super::subscriptions::{NotificationHub, SubscriberId, Subscription};
use super::with_deadline;
use crate::db::Storage;
use crate::error::Result;
use crate::models::{
    Comment, CommentId, CommentVote, CreateCommentInput, PostId, UpdateCommentInput,
};

#[derive(Clone)]
pub struct CommentService {
    storage: Arc<dyn Storage>,
    hub: Arc<NotificationHub>,
    request_timeout: Duration,
}

impl CommentService {
    pub fn new(
        storage: Arc<dyn Storage>,
        hub: Arc<NotificationHub>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            hub,
            request_timeout,
        }
    }

    /// Create a comment and push it to the post's live subscribers.
    ///
    /// Delivery happens after the store has committed, in creation order.
    /// It never waits on a subscriber: a full channel drops the comment.
    pub async fn create_comment(&self, input: CreateCommentInput) -> Result<Comment> {
        let comment = with_deadline(
            "failed to create comment",
            self.request_timeout,
            self.storage.create_comment(input),
        )
        .await?;

        tracing::debug!(
            comment_id = comment.id,
            post_id = comment.post_id,
            parent_id = ?comment.parent_id,
            "comment created"
        );

        let report = self.hub.publish(comment.post_id, &comment).await;
        tracing::trace!(
            comment_id = comment.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "comment published"
        );

        Ok(comment)
    }

    pub async fn update_comment(&self, input: UpdateCommentInput) -> Result<Comment> {
        with_deadline(
            "failed to update comment",
            self.request_timeout,
            self.storage.update_comment_if_not_deleted(input),
        )
        .await
    }

    /// Soft delete; deleting an already deleted comment succeeds
    pub async fn delete_comment(&self, id: CommentId) -> Result<()> {
        with_deadline(
            "failed to delete comment",
            self.request_timeout,
            self.storage.delete_comment(id),
        )
        .await?;

        tracing::debug!(comment_id = id, "comment deleted");
        Ok(())
    }

    pub async fn vote_comment(&self, vote: CommentVote) -> Result<Comment> {
        with_deadline(
            "failed to vote on comment",
            self.request_timeout,
            self.storage.vote_comment_if_not_deleted(vote),
        )
        .await
    }

    pub async fn get_comment(&self, id: CommentId) -> Result<Comment> {
        with_deadline(
            "failed to get comment",
            self.request_timeout,
            self.storage.get_comment(id),
        )
        .await
    }

    /// Full thread of a post in creation order, deleted comments included
    pub async fn get_post_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        with_deadline(
            "failed to list comments",
            self.request_timeout,
            self.storage.get_post_comments(post_id),
        )
        .await
    }

    pub async fn subscribe(&self, post_id: PostId) -> Subscription {
        self.hub.subscribe(post_id).await
    }

    pub async fn unsubscribe(&self, post_id: PostId, subscriber_id: SubscriberId) {
        self.hub.unsubscribe(post_id, subscriber_id).await
    }
}
