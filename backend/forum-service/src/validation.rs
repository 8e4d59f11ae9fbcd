//! Request validation
//!
//! Raw requests as an API layer receives them: string ids, unchecked lengths,
//! integer vote values. Each request validates itself and converts into the
//! typed input the services take. Nothing here reaches the store unchecked.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, ErrorKind};
use crate::models::{
    CommentVote, CreateCommentInput, CreatePostInput, PostVote, PostsQuery, SortOrder,
    UpdateCommentInput, UpdatePostInput, Vote, VoteValue,
};

pub const MAX_TITLE_LEN: u64 = 200;
pub const MAX_CONTENT_LEN: u64 = 20_000;
pub const MAX_COMMENT_LEN: u64 = 2_000;
pub const MAX_POSTS_LIMIT: i32 = 100;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid request: {0}")]
    Fields(#[from] ValidationErrors),

    #[error("at least one field needed to update")]
    NothingToUpdate,

    #[error("vote value must be 1 or -1")]
    InvalidVoteValue,

    #[error(transparent)]
    Core(#[from] AppError),
}

impl ValidationError {
    /// Core error kind, for the one validation failure that has one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ValidationError::Core(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Parse an entity id as sent by clients
pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim().parse::<i64>().map_err(|_| AppError::InvalidId)
}

fn parse_optional_id(raw: Option<&str>) -> Result<Option<i64>, AppError> {
    raw.map(parse_id).transpose()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    pub author_id: Uuid,

    #[validate(length(
        min = 1,
        max = MAX_TITLE_LEN,
        message = "post title must be 1 to 200 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = MAX_CONTENT_LEN,
        message = "post content must be 1 to 20000 characters"
    ))]
    pub content: String,
}

impl CreatePostRequest {
    pub fn into_input(self) -> Result<CreatePostInput, ValidationError> {
        self.validate()?;
        Ok(CreatePostInput {
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePostRequest {
    pub id: String,

    #[validate(length(
        min = 1,
        max = MAX_TITLE_LEN,
        message = "post title must be 1 to 200 characters"
    ))]
    pub title: Option<String>,

    #[validate(length(
        min = 1,
        max = MAX_CONTENT_LEN,
        message = "post content must be 1 to 20000 characters"
    ))]
    pub content: Option<String>,
}

impl UpdatePostRequest {
    pub fn into_input(self) -> Result<UpdatePostInput, ValidationError> {
        let id = parse_id(&self.id)?;
        if self.title.is_none() && self.content.is_none() {
            return Err(ValidationError::NothingToUpdate);
        }
        self.validate()?;

        Ok(UpdatePostInput {
            id,
            title: self.title,
            content: self.content,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub author_id: Uuid,

    #[validate(length(
        min = 1,
        max = MAX_COMMENT_LEN,
        message = "comment must be 1 to 2000 characters"
    ))]
    pub text: String,

    pub parent_id: Option<String>,
}

impl CreateCommentRequest {
    pub fn into_input(self) -> Result<CreateCommentInput, ValidationError> {
        let post_id = parse_id(&self.post_id)?;
        let parent_id = parse_optional_id(self.parent_id.as_deref())?;
        self.validate()?;

        Ok(CreateCommentInput {
            post_id,
            author_id: self.author_id,
            text: self.text,
            parent_id,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    pub id: String,

    #[validate(length(
        min = 1,
        max = MAX_COMMENT_LEN,
        message = "comment must be 1 to 2000 characters"
    ))]
    pub text: String,
}

impl UpdateCommentRequest {
    pub fn into_input(self) -> Result<UpdateCommentInput, ValidationError> {
        let id = parse_id(&self.id)?;
        self.validate()?;
        Ok(UpdateCommentInput {
            id,
            text: self.text,
        })
    }
}

/// Vote on a post or a comment, depending on the conversion used
#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub id: String,
    pub voter_id: Uuid,
    pub value: i32,
}

impl VoteRequest {
    fn parse(&self) -> Result<(i64, Vote), ValidationError> {
        let id = parse_id(&self.id)?;
        let value = VoteValue::from_i32(self.value).ok_or(ValidationError::InvalidVoteValue)?;
        Ok((
            id,
            Vote {
                voter_id: self.voter_id,
                value,
            },
        ))
    }

    pub fn into_post_vote(self) -> Result<PostVote, ValidationError> {
        let (post_id, vote) = self.parse()?;
        Ok(PostVote { post_id, vote })
    }

    pub fn into_comment_vote(self) -> Result<CommentVote, ValidationError> {
        let (comment_id, vote) = self.parse()?;
        Ok(CommentVote { comment_id, vote })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostsRequest {
    pub sort: SortOrder,

    #[validate(range(
        min = 0,
        max = MAX_POSTS_LIMIT,
        message = "limit must be between 0 and 100"
    ))]
    pub limit: i32,

    pub cursor: Option<String>,
}

impl PostsRequest {
    pub fn into_query(self) -> Result<PostsQuery, ValidationError> {
        self.validate()?;
        let limit = usize::try_from(self.limit)
            .map_err(|_| AppError::Internal(format!("limit out of range: {}", self.limit)))?;

        Ok(PostsQuery {
            sort: self.sort,
            limit,
            cursor: self.cursor,
        })
    }
}
