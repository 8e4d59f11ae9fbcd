//! Integration Tests: forum flows through the services
//!
//! Coverage:
//! - Vote toggling and flipping on posts and comments
//! - Comment restriction and deleted-thread rules
//! - Cursor pagination determinism for every sort order
//! - Stale cursor rejection
//! - Live comment feed delivery order and slow-subscriber drops
//! - Concurrent votes and comments against one post
//!
//! Architecture:
//! - In-memory store with a manual clock
//! - Real services and notification hub from `AppState`

mod common;

use std::time::Duration;

use common::{app, app_with, new_comment, new_post};
use forum_service::models::{
    CommentVote, PostId, PostVote, PostsQuery, SortOrder, UpdateCommentInput, Vote, VoteValue,
};
use forum_service::services::PostService;
use forum_service::{Config, ErrorKind};
use uuid::Uuid;

fn post_vote(post_id: PostId, voter_id: Uuid, value: VoteValue) -> PostVote {
    PostVote {
        post_id,
        vote: Vote { voter_id, value },
    }
}

async fn traverse(posts: &PostService, sort: SortOrder, page_size: usize) -> Vec<PostId> {
    let mut ids = Vec::new();
    let mut cursor = None;

    loop {
        let connection = posts
            .get_posts(PostsQuery {
                sort,
                limit: page_size,
                cursor: cursor.clone(),
            })
            .await
            .unwrap();

        assert!(connection.edges.len() <= page_size);
        ids.extend(connection.edges.iter().map(|edge| edge.post.id));

        if !connection.page_info.has_next {
            break;
        }
        cursor = connection.page_info.end_cursor;
        assert!(cursor.is_some());
    }

    ids
}

async fn single_page(posts: &PostService, sort: SortOrder) -> Vec<PostId> {
    let connection = posts
        .get_posts(PostsQuery {
            sort,
            limit: 1_000,
            cursor: None,
        })
        .await
        .unwrap();
    assert!(!connection.page_info.has_next);
    connection.edges.iter().map(|edge| edge.post.id).collect()
}

#[tokio::test]
async fn test_post_vote_toggle_scenario() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    assert_eq!(post.rating, 0);

    let voter = Uuid::new_v4();

    let post = state
        .posts
        .vote_post(post_vote(post.id, voter, VoteValue::Up))
        .await
        .unwrap();
    assert_eq!(post.rating, 1);

    let post = state
        .posts
        .vote_post(post_vote(post.id, voter, VoteValue::Up))
        .await
        .unwrap();
    assert_eq!(post.rating, 0);

    let post = state
        .posts
        .vote_post(post_vote(post.id, voter, VoteValue::Down))
        .await
        .unwrap();
    assert_eq!(post.rating, -1);

    // Flip back up moves the rating by two.
    let post = state
        .posts
        .vote_post(post_vote(post.id, voter, VoteValue::Up))
        .await
        .unwrap();
    assert_eq!(post.rating, 1);
}

#[tokio::test]
async fn test_comment_restriction_scenario() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();

    state
        .posts
        .set_comments_restricted(post.id, true)
        .await
        .unwrap();
    let err = state
        .comments
        .create_comment(new_comment(post.id, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommentsRestricted);

    state
        .posts
        .set_comments_restricted(post.id, false)
        .await
        .unwrap();
    state
        .comments
        .create_comment(new_comment(post.id, None))
        .await
        .unwrap();

    assert_eq!(state.posts.get_post(post.id).await.unwrap().comments_count, 1);
}

#[tokio::test]
async fn test_restriction_is_checked_before_parent() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    state
        .posts
        .set_comments_restricted(post.id, true)
        .await
        .unwrap();

    let err = state
        .comments
        .create_comment(new_comment(post.id, Some(9_999)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommentsRestricted);
}

#[tokio::test]
async fn test_reply_cannot_cross_posts() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    let other = state.posts.create_post(new_post("other")).await.unwrap();
    let foreign = state
        .comments
        .create_comment(new_comment(other.id, None))
        .await
        .unwrap();

    let mut subscription = state.comments.subscribe(post.id).await;
    let err = state
        .comments
        .create_comment(new_comment(post.id, Some(foreign.id)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParentCommentNotFound);
    assert!(subscription.try_recv().is_none());
    assert_eq!(state.posts.get_post(post.id).await.unwrap().comments_count, 0);
}

#[tokio::test]
async fn test_deleted_thread_integrity() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    let parent = state
        .comments
        .create_comment(new_comment(post.id, None))
        .await
        .unwrap();
    let reply = state
        .comments
        .create_comment(new_comment(post.id, Some(parent.id)))
        .await
        .unwrap();
    assert_eq!(reply.parent_id, Some(parent.id));

    state.comments.delete_comment(parent.id).await.unwrap();
    // Second delete is a no-op.
    state.comments.delete_comment(parent.id).await.unwrap();
    assert_eq!(state.posts.get_post(post.id).await.unwrap().comments_count, 1);

    let err = state
        .comments
        .create_comment(new_comment(post.id, Some(parent.id)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParentCommentDeleted);

    let err = state
        .comments
        .update_comment(UpdateCommentInput {
            id: parent.id,
            text: "edited".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommentDeleted);

    let err = state
        .comments
        .vote_comment(CommentVote {
            comment_id: parent.id,
            vote: Vote {
                voter_id: Uuid::new_v4(),
                value: VoteValue::Up,
            },
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommentDeleted);

    let thread = state.comments.get_post_comments(post.id).await.unwrap();
    assert_eq!(
        thread.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![parent.id, reply.id]
    );
    assert!(thread[0].is_deleted());
    assert!(!thread[1].is_deleted());

    let err = state
        .comments
        .create_comment(new_comment(post.id, Some(9_999)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParentCommentNotFound);
}

#[tokio::test]
async fn test_comment_vote_flip() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    let comment = state
        .comments
        .create_comment(new_comment(post.id, None))
        .await
        .unwrap();
    let voter = Uuid::new_v4();

    let vote = |value| CommentVote {
        comment_id: comment.id,
        vote: Vote {
            voter_id: voter,
            value,
        },
    };

    assert_eq!(
        state.comments.vote_comment(vote(VoteValue::Down)).await.unwrap().rating,
        -1
    );
    assert_eq!(
        state.comments.vote_comment(vote(VoteValue::Up)).await.unwrap().rating,
        1
    );
    assert_eq!(
        state.comments.vote_comment(vote(VoteValue::Up)).await.unwrap().rating,
        0
    );
}

#[tokio::test]
async fn test_pagination_is_deterministic_for_every_sort() {
    let state = app();
    let mut ids = Vec::new();
    for i in 0..23 {
        ids.push(state.posts.create_post(new_post(&format!("p{i}"))).await.unwrap().id);
    }

    // Produce rating ties: several posts at +1, several at -1, the rest at 0.
    for (i, id) in ids.iter().enumerate() {
        let value = match i % 3 {
            0 => Some(VoteValue::Up),
            1 => Some(VoteValue::Down),
            _ => None,
        };
        if let Some(value) = value {
            state
                .posts
                .vote_post(post_vote(*id, Uuid::new_v4(), value))
                .await
                .unwrap();
        }
    }

    for sort in [SortOrder::Rating, SortOrder::New, SortOrder::Old] {
        let expected = single_page(&state.posts, sort).await;
        assert_eq!(expected.len(), ids.len());

        for page_size in [1, 4, 7, 23, 50] {
            let first = traverse(&state.posts, sort, page_size).await;
            let second = traverse(&state.posts, sort, page_size).await;
            assert_eq!(first, expected, "sort {sort:?}, page size {page_size}");
            assert_eq!(first, second);
        }
    }

    let newest = single_page(&state.posts, SortOrder::New).await;
    let mut oldest = single_page(&state.posts, SortOrder::Old).await;
    oldest.reverse();
    assert_eq!(newest, oldest);
}

#[tokio::test]
async fn test_newest_first_pages_of_two() {
    let state = app();
    for i in 1..=5 {
        state.posts.create_post(new_post(&format!("p{i}"))).await.unwrap();
    }

    let mut pages = Vec::new();
    let mut cursor = None;
    loop {
        let connection = state
            .posts
            .get_posts(PostsQuery {
                sort: SortOrder::New,
                limit: 2,
                cursor,
            })
            .await
            .unwrap();
        pages.push((
            connection
                .edges
                .iter()
                .map(|edge| edge.post.id)
                .collect::<Vec<_>>(),
            connection.page_info.has_next,
        ));
        if !connection.page_info.has_next {
            break;
        }
        cursor = connection.page_info.end_cursor;
    }

    assert_eq!(
        pages,
        vec![(vec![5, 4], true), (vec![3, 2], true), (vec![1], false)]
    );
}

#[tokio::test]
async fn test_pagination_with_identical_timestamps_orders_by_id() {
    let state = app_with(Config::for_tests(), chrono::Duration::zero());
    let mut ids = Vec::new();
    for i in 0..9 {
        ids.push(state.posts.create_post(new_post(&format!("p{i}"))).await.unwrap().id);
    }

    assert_eq!(traverse(&state.posts, SortOrder::Old, 2).await, ids);

    ids.reverse();
    assert_eq!(traverse(&state.posts, SortOrder::New, 2).await, ids);
    // All ratings tie at zero, so rating order falls back to id descending.
    assert_eq!(traverse(&state.posts, SortOrder::Rating, 4).await, ids);
}

#[tokio::test]
async fn test_stale_cursor_is_rejected() {
    let state = app();
    for i in 0..5 {
        state.posts.create_post(new_post(&format!("p{i}"))).await.unwrap();
    }

    let page = state
        .posts
        .get_posts(PostsQuery {
            sort: SortOrder::New,
            limit: 2,
            cursor: None,
        })
        .await
        .unwrap();
    let anchor = page.edges.last().unwrap().post.id;

    state.posts.delete_post(anchor).await.unwrap();

    let err = state
        .posts
        .get_posts(PostsQuery {
            sort: SortOrder::New,
            limit: 2,
            cursor: page.page_info.end_cursor,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCursor);
}

#[tokio::test]
async fn test_malformed_cursor_is_rejected() {
    let state = app();
    let err = state
        .posts
        .get_posts(PostsQuery {
            sort: SortOrder::Rating,
            limit: 10,
            cursor: Some("definitely not a cursor".to_string()),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCursor);
}

#[tokio::test]
async fn test_missing_entities_report_their_kind() {
    let state = app();
    assert_eq!(
        state.posts.get_post(404).await.unwrap_err().kind(),
        ErrorKind::PostNotFound
    );
    assert_eq!(
        state.comments.get_comment(404).await.unwrap_err().kind(),
        ErrorKind::CommentNotFound
    );
    assert_eq!(
        state
            .comments
            .create_comment(new_comment(404, None))
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::PostNotFound
    );
}

#[tokio::test]
async fn test_deleting_post_removes_thread() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    let comment = state
        .comments
        .create_comment(new_comment(post.id, None))
        .await
        .unwrap();

    state.posts.delete_post(post.id).await.unwrap();

    assert_eq!(
        state.comments.get_comment(comment.id).await.unwrap_err().kind(),
        ErrorKind::CommentNotFound
    );
    assert_eq!(
        state
            .comments
            .get_post_comments(post.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::PostNotFound
    );
}

#[tokio::test]
async fn test_live_feed_delivers_new_comments() {
    let state = app();
    let post = state.posts.create_post(new_post("p")).await.unwrap();
    let other = state.posts.create_post(new_post("other")).await.unwrap();

    let mut subscription = state.comments.subscribe(post.id).await;
    let mut other_subscription = state.comments.subscribe(other.id).await;

    let created = state
        .comments
        .create_comment(new_comment(post.id, None))
        .await
        .unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .expect("comment not delivered")
        .expect("feed closed");
    assert_eq!(delivered, created);
    assert!(other_subscription.try_recv().is_none());

    state
        .comments
        .unsubscribe(post.id, subscription.id())
        .await;
    assert!(subscription.recv().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_live_feed_preserves_creation_order() {
    let mut config = Config::for_tests();
    config.subscriptions.channel_capacity = 512;
    let state = app_with(config, chrono::Duration::milliseconds(1));
    let post = state.posts.create_post(new_post("p")).await.unwrap();

    let mut subscription = state.comments.subscribe(post.id).await;

    let mut created = Vec::new();
    for _ in 0..200 {
        let comment = state
            .comments
            .create_comment(new_comment(post.id, None))
            .await
            .unwrap();
        created.push(comment.id);
    }

    let mut delivered = Vec::new();
    while let Some(comment) = subscription.try_recv() {
        delivered.push(comment.id);
    }
    assert_eq!(delivered, created);
    assert_eq!(state.hub.drop_stats().dropped, 0);
}

#[tokio::test]
async fn test_slow_subscriber_loses_comments_without_blocking() {
    let mut config = Config::for_tests();
    config.subscriptions.channel_capacity = 1;
    let state = app_with(config, chrono::Duration::seconds(1));
    let post = state.posts.create_post(new_post("p")).await.unwrap();

    let mut subscription = state.comments.subscribe(post.id).await;

    for _ in 0..3 {
        state
            .comments
            .create_comment(new_comment(post.id, None))
            .await
            .unwrap();
    }

    assert_eq!(state.hub.drop_stats().dropped, 2);
    assert!(state.hub.drop_stats().last_dropped_at.is_some());
    assert!(subscription.try_recv().is_some());
    assert!(subscription.try_recv().is_none());
    assert_eq!(state.posts.get_post(post.id).await.unwrap().comments_count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_and_comments_are_atomic() {
    let state = app();
    let post_id = state.posts.create_post(new_post("p")).await.unwrap().id;

    let mut handles = Vec::new();
    for i in 0..64 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let value = if i % 4 == 0 {
                VoteValue::Down
            } else {
                VoteValue::Up
            };
            state
                .posts
                .vote_post(post_vote(post_id, Uuid::new_v4(), value))
                .await
                .unwrap();
            state
                .comments
                .create_comment(new_comment(post_id, None))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let post = state.posts.get_post(post_id).await.unwrap();
    // 48 up, 16 down
    assert_eq!(post.rating, 32);
    assert_eq!(post.comments_count, 64);

    let thread = state.comments.get_post_comments(post.id).await.unwrap();
    let mut ids: Vec<_> = thread.iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 64);
    ids.dedup();
    assert_eq!(ids.len(), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_voter_racing_toggles_stays_consistent() {
    let state = app();
    let post_id = state.posts.create_post(new_post("p")).await.unwrap().id;
    let voter = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state
                .posts
                .vote_post(post_vote(post_id, voter, VoteValue::Up))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // An even number of toggles by one voter always lands back at zero.
    assert_eq!(state.posts.get_post(post_id).await.unwrap().rating, 0);
}
