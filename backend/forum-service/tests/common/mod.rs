//! Shared fixtures for forum-service integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use forum_service::clock::ManualClock;
use forum_service::db::InMemoryStorage;
use forum_service::models::{CreateCommentInput, CreatePostInput, PostId, CommentId};
use forum_service::{AppState, Config};
use uuid::Uuid;

/// In-memory application whose clock advances one second per creation
pub fn app() -> AppState {
    app_with(Config::for_tests(), chrono::Duration::seconds(1))
}

/// In-memory application with a custom config and clock step
pub fn app_with(config: Config, step: chrono::Duration) -> AppState {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start, step));
    let storage = Arc::new(InMemoryStorage::with_clock(clock.clone()));
    AppState::with_storage(config, storage, clock)
}

pub fn new_post(title: &str) -> CreatePostInput {
    CreatePostInput {
        author_id: Uuid::new_v4(),
        title: title.to_string(),
        content: format!("{title} content"),
    }
}

pub fn new_comment(post_id: PostId, parent_id: Option<CommentId>) -> CreateCommentInput {
    CreateCommentInput {
        post_id,
        author_id: Uuid::new_v4(),
        text: "comment".to_string(),
        parent_id,
    }
}
