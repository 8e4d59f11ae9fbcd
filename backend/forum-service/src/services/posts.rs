/// Post service - post lifecycle, voting and paginated listings
use std::sync::Arc;
use std::time::Duration;

use super::{logged, with_deadline};
use crate::cursor::CursorCodec;
use crate::db::Storage;
use crate::error::Result;
use crate::models::{
    CreatePostInput, PageInfo, Post, PostConnection, PostEdge, PostId, PostRatingCursor,
    PostTimeCursor, PostVote, PostsPage, PostsQuery, SortOrder, UpdatePostInput,
};

#[derive(Clone)]
pub struct PostService {
    storage: Arc<dyn Storage>,
    request_timeout: Duration,
}

impl PostService {
    pub fn new(storage: Arc<dyn Storage>, request_timeout: Duration) -> Self {
        Self {
            storage,
            request_timeout,
        }
    }

    pub async fn create_post(&self, input: CreatePostInput) -> Result<Post> {
        let post = with_deadline(
            "failed to create post",
            self.request_timeout,
            self.storage.create_post(input),
        )
        .await?;

        tracing::debug!(post_id = post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, id: PostId) -> Result<Post> {
        with_deadline(
            "failed to get post",
            self.request_timeout,
            self.storage.get_post(id),
        )
        .await
    }

    pub async fn update_post(&self, input: UpdatePostInput) -> Result<Post> {
        with_deadline(
            "failed to update post",
            self.request_timeout,
            self.storage.update_post(input),
        )
        .await
    }

    pub async fn delete_post(&self, id: PostId) -> Result<()> {
        with_deadline(
            "failed to delete post",
            self.request_timeout,
            self.storage.delete_post(id),
        )
        .await?;

        tracing::debug!(post_id = id, "post deleted");
        Ok(())
    }

    pub async fn set_comments_restricted(&self, id: PostId, restricted: bool) -> Result<Post> {
        with_deadline(
            "failed to change comment restriction",
            self.request_timeout,
            self.storage.set_comments_restricted(id, restricted),
        )
        .await
    }

    pub async fn vote_post(&self, vote: PostVote) -> Result<Post> {
        with_deadline(
            "failed to vote on post",
            self.request_timeout,
            self.storage.vote_post(vote),
        )
        .await
    }

    /// One page of posts in the requested order.
    ///
    /// The cursor must come from an earlier page of the same sort order.
    /// Every edge carries its own cursor; `end_cursor` is the last edge's.
    pub async fn get_posts(&self, query: PostsQuery) -> Result<PostConnection> {
        let cursor = query.cursor.as_deref();

        let (page, encode): (PostsPage, fn(&Post) -> String) = match query.sort {
            SortOrder::Rating => {
                let cursor = logged(
                    "failed to decode cursor",
                    cursor.map(CursorCodec::decode_rating).transpose(),
                )?;
                let page = with_deadline(
                    "failed to list posts",
                    self.request_timeout,
                    self.storage.get_posts_sorted_by_rating(query.limit, cursor),
                )
                .await?;
                (page, rating_cursor)
            }
            SortOrder::New | SortOrder::Old => {
                let cursor = logged(
                    "failed to decode cursor",
                    cursor.map(CursorCodec::decode_time).transpose(),
                )?;
                let newest_first = query.sort == SortOrder::New;
                let page = with_deadline(
                    "failed to list posts",
                    self.request_timeout,
                    self.storage
                        .get_posts_sorted_by_time(query.limit, cursor, newest_first),
                )
                .await?;
                (page, time_cursor)
            }
        };

        Ok(into_connection(page, encode))
    }
}

fn rating_cursor(post: &Post) -> String {
    CursorCodec::encode_rating(&PostRatingCursor {
        rating: post.rating,
        id: post.id,
    })
}

fn time_cursor(post: &Post) -> String {
    CursorCodec::encode_time(&PostTimeCursor {
        time: post.created_at,
        id: post.id,
    })
}

fn into_connection(page: PostsPage, encode: fn(&Post) -> String) -> PostConnection {
    let edges: Vec<PostEdge> = page
        .posts
        .into_iter()
        .map(|post| PostEdge {
            cursor: encode(&post),
            post,
        })
        .collect();

    let end_cursor = edges.last().map(|edge| edge.cursor.clone());

    PostConnection {
        edges,
        page_info: PageInfo {
            has_next: page.has_next,
            end_cursor,
        },
    }
}
