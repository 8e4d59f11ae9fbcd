//! PostgreSQL content store
//!
//! Same observable behavior as the in-memory store. Each mutation runs in one
//! transaction and locks the rows it reads with `FOR UPDATE`, so concurrent
//! votes on one entity serialize and a dropped call rolls back.

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::vote_ledger::{resolve_vote, VoteChange};
use super::Storage;
use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::{
    Comment, CommentId, CommentVote, CreateCommentInput, CreatePostInput, Post, PostId,
    PostRatingCursor, PostTimeCursor, PostVote, PostsPage, UpdateCommentInput, UpdatePostInput,
    VoteValue,
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const POST_COLUMNS: &str =
    "id, author_id, title, content, created_at, rating, comments_count, comments_restricted";
const COMMENT_COLUMNS: &str = "id, post_id, author_id, text, created_at, rating, parent_id";

/// Vote tables share one shape: (entity key, voter_id, value)
#[derive(Clone, Copy)]
struct VoteTable {
    table: &'static str,
    key: &'static str,
}

const POST_VOTES: VoteTable = VoteTable {
    table: "post_votes",
    key: "post_id",
};
const COMMENT_VOTES: VoteTable = VoteTable {
    table: "comment_votes",
    key: "comment_id",
};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the pool, check connectivity and optionally apply migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(
            max_connections = config.max_connections,
            "connected to postgres database"
        );

        if config.run_migrations {
            MIGRATOR.run(&pool).await?;
            info!("database migrations applied");
        }

        Ok(Self::new(pool))
    }

    /// Open a REPEATABLE READ transaction so a cursor check and the page
    /// query that follows see the same snapshot
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

/// Trim the lookahead row and report whether it existed
fn into_page(mut posts: Vec<Post>, limit: usize) -> PostsPage {
    let has_next = posts.len() > limit;
    posts.truncate(limit);
    PostsPage { posts, has_next }
}

/// Row limit that fetches one extra row to detect a following page
fn lookahead_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1)
}

fn vote_from_db(value: i16) -> Result<VoteValue> {
    VoteValue::from_i32(i32::from(value))
        .ok_or_else(|| AppError::Internal(format!("stored vote value out of range: {value}")))
}

/// Apply the vote rule against the stored ledger row and persist the outcome.
/// The caller holds the entity row lock.
async fn apply_vote(
    tx: &mut Transaction<'_, Postgres>,
    votes: VoteTable,
    entity_id: i64,
    voter_id: Uuid,
    value: VoteValue,
) -> Result<VoteChange> {
    let previous: Option<i16> = sqlx::query_scalar(&format!(
        "SELECT value FROM {} WHERE {} = $1 AND voter_id = $2 FOR UPDATE",
        votes.table, votes.key
    ))
    .bind(entity_id)
    .bind(voter_id)
    .fetch_optional(&mut **tx)
    .await?;

    let previous = previous.map(vote_from_db).transpose()?;
    let change = resolve_vote(previous, value);

    match change.recorded {
        Some(recorded) => {
            sqlx::query(&format!(
                "INSERT INTO {table} ({key}, voter_id, value) VALUES ($1, $2, $3) \
                 ON CONFLICT ({key}, voter_id) DO UPDATE SET value = EXCLUDED.value",
                table = votes.table,
                key = votes.key
            ))
            .bind(entity_id)
            .bind(voter_id)
            .bind(recorded.as_i16())
            .execute(&mut **tx)
            .await?;
        }
        None => {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE {} = $1 AND voter_id = $2",
                votes.table, votes.key
            ))
            .bind(entity_id)
            .bind(voter_id)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(change)
}

/// Lock a comment row and fail unless it exists and is not soft-deleted
async fn lock_live_comment(
    tx: &mut Transaction<'_, Postgres>,
    id: CommentId,
) -> Result<()> {
    let deleted: Option<bool> =
        sqlx::query_scalar("SELECT text IS NULL FROM comments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

    match deleted {
        None => Err(AppError::CommentNotFound),
        Some(true) => Err(AppError::CommentDeleted),
        Some(false) => Ok(()),
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_post(&self, input: CreatePostInput) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (author_id, title, content) VALUES ($1, $2, $3) RETURNING {POST_COLUMNS}"
        ))
        .bind(input.author_id)
        .bind(&input.title)
        .bind(&input.content)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Post> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::PostNotFound)
    }

    async fn update_post(&self, input: UpdatePostInput) -> Result<Post> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title), content = COALESCE($3, content)
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(input.id)
        .bind(input.title)
        .bind(input.content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::PostNotFound)
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        // Votes, comments and comment votes go with the post (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::PostNotFound);
        }
        Ok(())
    }

    async fn set_comments_restricted(&self, id: PostId, restricted: bool) -> Result<Post> {
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET comments_restricted = $2 WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(restricted)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::PostNotFound)
    }

    async fn vote_post(&self, vote: PostVote) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<PostId> =
            sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(vote.post_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(AppError::PostNotFound);
        }

        let change = apply_vote(
            &mut tx,
            POST_VOTES,
            vote.post_id,
            vote.vote.voter_id,
            vote.vote.value,
        )
        .await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET rating = rating + $2 WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(vote.post_id)
        .bind(change.delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(post_id = post.id, delta = change.delta, "post vote applied");
        Ok(post)
    }

    async fn get_posts_sorted_by_rating(
        &self,
        limit: usize,
        cursor: Option<PostRatingCursor>,
    ) -> Result<PostsPage> {
        let mut tx = self.begin_snapshot().await?;

        let posts = match cursor {
            None => {
                let sql = format!(
                    "SELECT {POST_COLUMNS} FROM posts ORDER BY rating DESC, id DESC LIMIT $1"
                );
                sqlx::query_as::<_, Post>(&sql)
                    .bind(lookahead_limit(limit))
                    .fetch_all(&mut *tx)
                    .await?
            }
            Some(c) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM posts WHERE rating = $1 AND id = $2)",
                )
                .bind(c.rating)
                .bind(c.id)
                .fetch_one(&mut *tx)
                .await?;
                if !exists {
                    return Err(AppError::InvalidCursor);
                }

                let sql = format!(
                    r#"
                    SELECT {POST_COLUMNS} FROM posts
                    WHERE (rating, id) < ($1, $2)
                    ORDER BY rating DESC, id DESC
                    LIMIT $3
                    "#
                );
                sqlx::query_as::<_, Post>(&sql)
                    .bind(c.rating)
                    .bind(c.id)
                    .bind(lookahead_limit(limit))
                    .fetch_all(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(into_page(posts, limit))
    }

    async fn get_posts_sorted_by_time(
        &self,
        limit: usize,
        cursor: Option<PostTimeCursor>,
        newest_first: bool,
    ) -> Result<PostsPage> {
        let (direction, comparison) = if newest_first {
            ("DESC", "<")
        } else {
            ("ASC", ">")
        };
        let mut tx = self.begin_snapshot().await?;

        let posts = match cursor {
            None => {
                let sql = format!(
                    "SELECT {POST_COLUMNS} FROM posts \
                     ORDER BY created_at {direction}, id {direction} LIMIT $1"
                );
                sqlx::query_as::<_, Post>(&sql)
                    .bind(lookahead_limit(limit))
                    .fetch_all(&mut *tx)
                    .await?
            }
            Some(c) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM posts WHERE created_at = $1 AND id = $2)",
                )
                .bind(c.time)
                .bind(c.id)
                .fetch_one(&mut *tx)
                .await?;
                if !exists {
                    return Err(AppError::InvalidCursor);
                }

                let sql = format!(
                    r#"
                    SELECT {POST_COLUMNS} FROM posts
                    WHERE (created_at, id) {comparison} ($1, $2)
                    ORDER BY created_at {direction}, id {direction}
                    LIMIT $3
                    "#
                );
                sqlx::query_as::<_, Post>(&sql)
                    .bind(c.time)
                    .bind(c.id)
                    .bind(lookahead_limit(limit))
                    .fetch_all(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(into_page(posts, limit))
    }

    async fn create_comment(&self, input: CreateCommentInput) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        let restricted: Option<bool> =
            sqlx::query_scalar("SELECT comments_restricted FROM posts WHERE id = $1 FOR UPDATE")
                .bind(input.post_id)
                .fetch_optional(&mut *tx)
                .await?;
        match restricted {
            None => return Err(AppError::PostNotFound),
            Some(true) => return Err(AppError::CommentsRestricted),
            Some(false) => {}
        }

        if let Some(parent_id) = input.parent_id {
            let parent: Option<(PostId, bool)> =
                sqlx::query_as("SELECT post_id, text IS NULL FROM comments WHERE id = $1 FOR SHARE")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            // A parent on another post does not exist as far as this thread is concerned
            match parent {
                None => return Err(AppError::ParentCommentNotFound),
                Some((parent_post, _)) if parent_post != input.post_id => {
                    return Err(AppError::ParentCommentNotFound)
                }
                Some((_, true)) => return Err(AppError::ParentCommentDeleted),
                Some((_, false)) => {}
            }
        }

        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (post_id, author_id, text, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(input.post_id)
        .bind(input.author_id)
        .bind(&input.text)
        .bind(input.parent_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = $1")
            .bind(input.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn update_comment_if_not_deleted(&self, input: UpdateCommentInput) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;
        lock_live_comment(&mut tx, input.id).await?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET text = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(input.id)
        .bind(&input.text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(PostId, bool)> =
            sqlx::query_as("SELECT post_id, text IS NULL FROM comments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let (post_id, already_deleted) = row.ok_or(AppError::CommentNotFound)?;
        if already_deleted {
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query("UPDATE comments SET text = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE posts SET comments_count = GREATEST(comments_count - 1, 0) WHERE id = $1",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn vote_comment_if_not_deleted(&self, vote: CommentVote) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;
        lock_live_comment(&mut tx, vote.comment_id).await?;

        let change = apply_vote(
            &mut tx,
            COMMENT_VOTES,
            vote.comment_id,
            vote.vote.voter_id,
            vote.vote.value,
        )
        .await?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET rating = rating + $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(vote.comment_id)
        .bind(change.delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::CommentNotFound)
    }

    async fn get_post_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(AppError::PostNotFound);
        }

        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY id ASC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn close(&self) {
        info!("closing postgres pool");
        self.pool.close().await;
        info!("postgres pool closed");
    }
}
