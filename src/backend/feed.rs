//! In-process change feed hub.
//!
//! Models the server-side row-filtered notification channel: stores publish a
//! [`ChangeEvent`] after every committed mutation and the hub fans it out to
//! every subscriber whose owner filter matches. Subscriptions are owned
//! resources; dropping one synchronously removes it from the routing table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

use crate::types::ChangeEvent;

struct Subscriber {
    owner: String,
    sender: UnboundedSender<ChangeEvent>,
}

/// Fan-out hub routing mutation events to owner-filtered subscribers.
pub struct FeedHub {
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
}

impl FeedHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    /// Opens a subscription scoped to rows owned by `owner`.
    pub fn subscribe(self: &Arc<Self>, owner: &str) -> FeedSubscription {
        let (sender, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock_subscribers().insert(
            id,
            Subscriber {
                owner: owner.to_string(),
                sender,
            },
        );
        debug!(subscription = %id, owner, "feed subscription opened");
        FeedSubscription {
            id,
            hub: Arc::clone(self),
            events,
        }
    }

    /// Publishes an event to every subscriber filtered to `owner`.
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, owner: &str, event: ChangeEvent) -> usize {
        let subs = self.lock_subscribers();
        let mut delivered = 0;
        for sub in subs.values() {
            if sub.owner == owner && sub.sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(
            owner,
            kind = event.kind(),
            id = event.record_id(),
            delivered,
            "feed event published"
        );
        delivered
    }

    /// Number of currently registered subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn remove(&self, id: Uuid) {
        if self.lock_subscribers().remove(&id).is_some() {
            debug!(subscription = %id, "feed subscription released");
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Subscriber>> {
        // Recover the map on poison; subscriber state stays consistent because
        // every mutation is a single insert or remove.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An active change feed subscription.
///
/// Owned by the engine while authenticated. Deregistration happens in `Drop`,
/// so releasing the subscription is synchronous and no event can be observed
/// after teardown.
pub struct FeedSubscription {
    id: Uuid,
    hub: Arc<FeedHub>,
    events: UnboundedReceiver<ChangeEvent>,
}

impl FeedSubscription {
    /// Returns the next pending event without waiting, if any.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    /// Waits for the next event. Returns `None` once the subscription has
    /// been deregistered and all buffered events are drained.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Releases the subscription. Equivalent to dropping it.
    pub fn unsubscribe(self) {}
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

impl super::ChangeFeed for Arc<FeedHub> {
    async fn subscribe(
        &self,
        owner: &str,
    ) -> Result<FeedSubscription, crate::types::errors::SubscriptionError> {
        Ok(FeedHub::subscribe(self, owner))
    }
}
