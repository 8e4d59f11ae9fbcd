//! In-memory content store
//!
//! All entity state sits behind one `tokio::sync::RwLock`. Mutations take the
//! write guard and finish without awaiting anything else, so a call either
//! never starts (its future was dropped while waiting for the lock) or runs
//! to completion.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::vote_ledger::VoteLedger;
use super::Storage;
use crate::clock::{Clock, SystemClock};
use crate::error::{AppError, Result};
use crate::models::{
    Comment, CommentId, CommentVote, CreateCommentInput, CreatePostInput, Post, PostId,
    PostRatingCursor, PostTimeCursor, PostVote, PostsPage, UpdateCommentInput, UpdatePostInput,
};

struct State {
    posts: HashMap<PostId, Post>,
    /// Ordered by id, which is also creation order
    comments: BTreeMap<CommentId, Comment>,
    post_votes: VoteLedger<PostId>,
    comment_votes: VoteLedger<CommentId>,
    next_post_id: PostId,
    next_comment_id: CommentId,
}

impl State {
    fn new() -> Self {
        Self {
            posts: HashMap::new(),
            comments: BTreeMap::new(),
            post_votes: VoteLedger::new(),
            comment_votes: VoteLedger::new(),
            next_post_id: 1,
            next_comment_id: 1,
        }
    }

    fn next_post_id(&mut self) -> PostId {
        let id = self.next_post_id;
        self.next_post_id += 1;
        id
    }

    fn next_comment_id(&mut self) -> CommentId {
        let id = self.next_comment_id;
        self.next_comment_id += 1;
        id
    }

    fn post_mut(&mut self, id: PostId) -> Result<&mut Post> {
        self.posts.get_mut(&id).ok_or(AppError::PostNotFound)
    }

    fn live_comment_mut(&mut self, id: CommentId) -> Result<&mut Comment> {
        let comment = self
            .comments
            .get_mut(&id)
            .ok_or(AppError::CommentNotFound)?;
        if comment.is_deleted() {
            return Err(AppError::CommentDeleted);
        }
        Ok(comment)
    }
}

pub struct InMemoryStorage {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::new()),
            clock,
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_post(&self, input: CreatePostInput) -> Result<Post> {
        let mut state = self.state.write().await;

        let post = Post {
            id: state.next_post_id(),
            author_id: input.author_id,
            title: input.title,
            content: input.content,
            created_at: self.clock.now(),
            rating: 0,
            comments_count: 0,
            comments_restricted: false,
        };
        state.post_votes.open(post.id);
        state.posts.insert(post.id, post.clone());

        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Post> {
        let state = self.state.read().await;
        state.posts.get(&id).cloned().ok_or(AppError::PostNotFound)
    }

    async fn update_post(&self, input: UpdatePostInput) -> Result<Post> {
        let mut state = self.state.write().await;
        let post = state.post_mut(input.id)?;

        if let Some(title) = input.title {
            post.title = title;
        }
        if let Some(content) = input.content {
            post.content = content;
        }

        Ok(post.clone())
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        let mut state = self.state.write().await;

        if state.posts.remove(&id).is_none() {
            return Err(AppError::PostNotFound);
        }
        state.post_votes.remove(&id);

        // Comments and their votes go with the post, matching the SQL schema.
        let orphaned: Vec<CommentId> = state
            .comments
            .values()
            .filter(|c| c.post_id == id)
            .map(|c| c.id)
            .collect();
        for comment_id in orphaned {
            state.comments.remove(&comment_id);
            state.comment_votes.remove(&comment_id);
        }
        Ok(())
    }

    async fn set_comments_restricted(&self, id: PostId, restricted: bool) -> Result<Post> {
        let mut state = self.state.write().await;
        let post = state.post_mut(id)?;
        post.comments_restricted = restricted;
        Ok(post.clone())
    }

    async fn vote_post(&self, vote: PostVote) -> Result<Post> {
        let mut state = self.state.write().await;

        if !state.posts.contains_key(&vote.post_id) {
            return Err(AppError::PostNotFound);
        }
        let delta = state
            .post_votes
            .apply(vote.post_id, vote.vote.voter_id, vote.vote.value);

        let post = state.post_mut(vote.post_id)?;
        post.rating += delta;
        Ok(post.clone())
    }

    async fn get_posts_sorted_by_rating(
        &self,
        limit: usize,
        cursor: Option<PostRatingCursor>,
    ) -> Result<PostsPage> {
        let state = self.state.read().await;

        let mut posts: Vec<&Post> = state.posts.values().collect();
        posts.sort_by(|a, b| b.rating.cmp(&a.rating).then(b.id.cmp(&a.id)));

        page_after(
            &posts,
            limit,
            cursor.map(|c| (c.rating, c.id)),
            |p| (p.rating, p.id),
        )
    }

    async fn get_posts_sorted_by_time(
        &self,
        limit: usize,
        cursor: Option<PostTimeCursor>,
        newest_first: bool,
    ) -> Result<PostsPage> {
        let state = self.state.read().await;

        let mut posts: Vec<&Post> = state.posts.values().collect();
        posts.sort_by(|a, b| {
            let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            if newest_first {
                ord.reverse()
            } else {
                ord
            }
        });

        page_after(
            &posts,
            limit,
            cursor.map(|c| (c.time, c.id)),
            |p| (p.created_at, p.id),
        )
    }

    async fn create_comment(&self, input: CreateCommentInput) -> Result<Comment> {
        let mut state = self.state.write().await;

        let post = state
            .posts
            .get(&input.post_id)
            .ok_or(AppError::PostNotFound)?;
        if post.comments_restricted {
            return Err(AppError::CommentsRestricted);
        }

        if let Some(parent_id) = input.parent_id {
            let parent = state
                .comments
                .get(&parent_id)
                .ok_or(AppError::ParentCommentNotFound)?;
            if parent.post_id != input.post_id {
                return Err(AppError::ParentCommentNotFound);
            }
            if parent.is_deleted() {
                return Err(AppError::ParentCommentDeleted);
            }
        }

        let comment = Comment {
            id: state.next_comment_id(),
            post_id: input.post_id,
            author_id: input.author_id,
            text: Some(input.text),
            created_at: self.clock.now(),
            rating: 0,
            parent_id: input.parent_id,
        };
        state.comment_votes.open(comment.id);
        state.comments.insert(comment.id, comment.clone());
        state.post_mut(input.post_id)?.comments_count += 1;

        Ok(comment)
    }

    async fn update_comment_if_not_deleted(&self, input: UpdateCommentInput) -> Result<Comment> {
        let mut state = self.state.write().await;
        let comment = state.live_comment_mut(input.id)?;
        comment.text = Some(input.text);
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let mut state = self.state.write().await;

        let comment = state
            .comments
            .get_mut(&id)
            .ok_or(AppError::CommentNotFound)?;
        if comment.is_deleted() {
            return Ok(());
        }
        comment.text = None;
        let post_id = comment.post_id;

        // Votes on the comment are kept.
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.comments_count = (post.comments_count - 1).max(0);
        }
        Ok(())
    }

    async fn vote_comment_if_not_deleted(&self, vote: CommentVote) -> Result<Comment> {
        let mut state = self.state.write().await;

        state.live_comment_mut(vote.comment_id)?;
        let delta = state
            .comment_votes
            .apply(vote.comment_id, vote.vote.voter_id, vote.vote.value);

        let comment = state.live_comment_mut(vote.comment_id)?;
        comment.rating += delta;
        Ok(comment.clone())
    }

    async fn get_comment(&self, id: CommentId) -> Result<Comment> {
        let state = self.state.read().await;
        state
            .comments
            .get(&id)
            .cloned()
            .ok_or(AppError::CommentNotFound)
    }

    async fn get_post_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let state = self.state.read().await;

        if !state.posts.contains_key(&post_id) {
            return Err(AppError::PostNotFound);
        }
        Ok(state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn close(&self) {}
}

/// Slice one page out of an already sorted candidate list.
///
/// With a cursor the page starts right after the entry whose key equals it.
/// A cursor that matches nothing (the post was deleted, or its rating moved)
/// is rejected instead of silently restarting from the first page.
fn page_after<K, F>(sorted: &[&Post], limit: usize, cursor: Option<K>, key: F) -> Result<PostsPage>
where
    K: PartialEq,
    F: Fn(&Post) -> K,
{
    let start = match cursor {
        None => 0,
        Some(cursor) => {
            sorted
                .iter()
                .position(|p| key(*p) == cursor)
                .ok_or(AppError::InvalidCursor)?
                + 1
        }
    };

    let end = start.saturating_add(limit).min(sorted.len());
    Ok(PostsPage {
        posts: sorted[start..end].iter().map(|p| (*p).clone()).collect(),
        has_next: end < sorted.len(),
    })
}
