/// Business logic layer for forum-service
///
/// This module provides high-level operations:
/// - Post service: post lifecycle, voting and cursor-paginated listings
/// - Comment service: threaded comments, voting and live comment feed
/// - Subscriptions: the in-process registry that fans new comments out
pub mod comments;
pub mod posts;
pub mod subscriptions;

pub use comments::CommentService;
pub use posts::PostService;
pub use subscriptions::{DropStats, NotificationHub, PublishReport, SubscriberId, Subscription};

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result, ResultExt};

/// Run a store call under the request deadline and tag failures with the
/// operation that produced them.
pub(crate) async fn with_deadline<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => logged(operation, result),
        Err(_) => {
            let err = AppError::Timeout {
                operation,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            };
            err.log();
            Err(err)
        }
    }
}

/// Tag a failure with the operation and log it once
pub(crate) fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    let result = result.context(operation);
    if let Err(err) = &result {
        err.log();
    }
    result
}
