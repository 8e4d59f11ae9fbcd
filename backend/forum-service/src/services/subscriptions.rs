//! Live comment feed
//!
//! Tracks which subscribers follow which post and pushes newly created
//! comments to them. Each subscriber gets a bounded channel; a subscriber that
//! falls behind loses messages instead of slowing the publisher down.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{Comment, CommentEvent, PostId};

/// Unique identifier handed out with every subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving end of a post's comment feed.
///
/// Owned by the subscriber. The stream ends (`recv` returns `None`) once the
/// hub drops the sending half on `unsubscribe`; dropping the subscription is
/// picked up by the hub on the next publish.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    post_id: PostId,
    receiver: Receiver<CommentEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub async fn recv(&mut self) -> Option<CommentEvent> {
        self.receiver.recv().await
    }

    /// Next buffered comment, if any, without waiting
    pub fn try_recv(&mut self) -> Option<CommentEvent> {
        self.receiver.try_recv().ok()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: Sender<CommentEvent>,
}

/// Messages lost to full subscriber channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropStats {
    pub dropped: u64,
    pub last_dropped_at: Option<DateTime<Utc>>,
}

/// Result of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    /// Subscribers whose receiver was gone and were removed
    pub pruned: usize,
}

/// Subscriber registry for live comment delivery.
///
/// The registry lock is held only to snapshot or edit the subscriber lists,
/// never while sending.
pub struct NotificationHub {
    // post_id -> subscribers
    subscribers: RwLock<HashMap<PostId, Vec<Subscriber>>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    drops: Mutex<DropStats>,
}

impl NotificationHub {
    /// `capacity` is the per-subscriber buffer size; zero is raised to one.
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            clock,
            drops: Mutex::new(DropStats::default()),
        }
    }

    pub async fn subscribe(&self, post_id: PostId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = SubscriberId::new();

        let mut guard = self.subscribers.write().await;
        let entry = guard.entry(post_id).or_default();
        entry.push(Subscriber { id, sender });

        debug!(
            post_id,
            subscriber_id = %id,
            total = entry.len(),
            "subscriber added"
        );

        Subscription {
            id,
            post_id,
            receiver,
        }
    }

    /// Remove a subscriber and close its channel. Unknown ids are ignored.
    pub async fn unsubscribe(&self, post_id: PostId, subscriber_id: SubscriberId) {
        let mut guard = self.subscribers.write().await;

        let Some(subscribers) = guard.get_mut(&post_id) else {
            return;
        };

        let before = subscribers.len();
        subscribers.retain(|s| s.id != subscriber_id);
        if subscribers.len() != before {
            debug!(post_id, subscriber_id = %subscriber_id, "subscriber removed");
        }

        if subscribers.is_empty() {
            guard.remove(&post_id);
        }
    }

    /// Deliver `comment` to every current subscriber of `post_id` without
    /// waiting on any of them.
    pub async fn publish(&self, post_id: PostId, comment: &Comment) -> PublishReport {
        let targets: Vec<(SubscriberId, Sender<CommentEvent>)> = {
            let guard = self.subscribers.read().await;
            match guard.get(&post_id) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|s| (s.id, s.sender.clone()))
                    .collect(),
                None => return PublishReport::default(),
            }
        };

        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        for (id, sender) in targets {
            match sender.try_send(comment.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    self.record_drop();
                    warn!(
                        post_id,
                        comment_id = comment.id,
                        subscriber_id = %id,
                        "subscriber channel full, dropping comment"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            report.pruned = self.prune(post_id, &closed).await;
        }

        report
    }

    pub async fn subscriber_count(&self, post_id: PostId) -> usize {
        let guard = self.subscribers.read().await;
        guard.get(&post_id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn drop_stats(&self) -> DropStats {
        *self.drops.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_drop(&self) {
        let now = self.clock.now();
        let mut stats = self.drops.lock().unwrap_or_else(|e| e.into_inner());
        stats.dropped += 1;
        stats.last_dropped_at = Some(now);
    }

    async fn prune(&self, post_id: PostId, closed: &[SubscriberId]) -> usize {
        let mut guard = self.subscribers.write().await;
        let Some(subscribers) = guard.get_mut(&post_id) else {
            return 0;
        };

        let before = subscribers.len();
        subscribers.retain(|s| !closed.contains(&s.id));
        let pruned = before - subscribers.len();

        if subscribers.is_empty() {
            guard.remove(&post_id);
        }
        if pruned > 0 {
            debug!(post_id, pruned, "removed subscribers with closed receivers");
        }
        pruned
    }
}
