//! A handle binding one subscriber callback to one channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::Instant;

use rand::Rng;

use crate::channel::{Channel, Message};

/// Identifies one `Subscription` registration, e.g. for removal on cancel.
/// Distinct per `subscribe()` call, even if two subscriptions wrap the same
/// underlying callback — see [`SubscriberIdentity`] for that case.
pub type SubscriberId = u64;

/// Generates a fresh random subscriber id.
pub(crate) fn new_subscriber_id() -> SubscriberId {
    rand::thread_rng().gen()
}

/// A subscriber callback. Invoked with the message and never called
/// concurrently with itself (see the dispatcher's single-writer invariant).
pub type Subscriber = Arc<dyn Fn(&Message) + Send + Sync>;

/// Stable identity of the underlying callback itself, shared by every
/// `Subscription` that wraps the same `Subscriber` (e.g. one callback
/// registered both on an ancestor with `include_subchannels` and directly on
/// a descendant channel). Derived from the callback's `Arc` data pointer,
/// the same way the original keys delivery dedup off the `Subscriber`
/// object's own UID rather than the registration's
/// (`examples/original_source/dss/log/Subscribers.py:20,26-32`) — used by
/// [`crate::log::message::LogMessage`]'s delivery dedup.
pub type SubscriberIdentity = usize;

pub(crate) fn subscriber_identity(subscriber: &Subscriber) -> SubscriberIdentity {
    Arc::as_ptr(subscriber) as *const () as usize
}

/// How a subscription is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Invoked on the publisher's thread, in the order it was registered.
    Synchronous,
    /// Enqueued onto the bus's dispatcher queue and invoked on the
    /// dispatcher thread.
    Asynchronous,
}

/// A live binding between a subscriber callback and a channel.
///
/// Cancelling a subscription removes it from its channel's list but does not
/// abort a delivery already in flight.
pub struct Subscription {
    id: SubscriberId,
    channel: Weak<Channel>,
    channel_name: String,
    subscriber: Subscriber,
    mode: DispatchMode,
    include_subchannels: bool,
    thread_id: Option<ThreadId>,
    created_at: Instant,
    message_count: AtomicU64,
    active: AtomicBool,
    epoch: Arc<AtomicU64>,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        channel: Weak<Channel>,
        channel_name: String,
        subscriber: Subscriber,
        mode: DispatchMode,
        include_subchannels: bool,
        thread_id: Option<ThreadId>,
        epoch: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id: new_subscriber_id(),
            channel,
            channel_name,
            subscriber,
            mode,
            include_subchannels,
            thread_id,
            created_at: Instant::now(),
            message_count: AtomicU64::new(0),
            active: AtomicBool::new(true),
            epoch,
        }
    }

    /// The random id identifying this subscriber.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    /// The name of the channel this subscription was registered on.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub(crate) fn subscriber(&self) -> Subscriber {
        Arc::clone(&self.subscriber)
    }

    /// Stable identity of the underlying callback, for log delivery dedup.
    pub(crate) fn subscriber_identity(&self) -> SubscriberIdentity {
        subscriber_identity(&self.subscriber)
    }

    /// Whether this subscription dispatches synchronously or asynchronously.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Whether this subscription also receives messages sent to descendant
    /// channels (a wildcard subtree subscription).
    pub fn include_subchannels(&self) -> bool {
        self.include_subchannels
    }

    /// If set, only messages sent from this thread are delivered.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread_id
    }

    /// When this subscription was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Number of messages delivered to this subscription so far.
    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    pub(crate) fn record_delivery(&self) {
        self.message_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether this subscription is still eligible for delivery.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Deactivates this subscription and removes it from its channel's
    /// subscription list.
    ///
    /// Idempotent in its observable effect: only the first call does
    /// anything; later calls are no-ops. In-flight deliveries already
    /// dequeued by the dispatcher are not aborted.
    pub fn cancel(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(channel) = self.channel.upgrade() {
                channel.remove_subscription(self.id, self.mode);
            }
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel_name", &self.channel_name)
            .field("mode", &self.mode)
            .field("include_subchannels", &self.include_subchannels)
            .field("active", &self.is_active())
            .field("message_count", &self.message_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_subscription() -> Subscription {
        Subscription::new(
            Weak::new(),
            "root".into(),
            Arc::new(|_msg: &Message| {}),
            DispatchMode::Synchronous,
            false,
            None,
            Arc::new(AtomicU64::new(0)),
        )
    }

    #[test]
    fn subscriber_identity_shared_across_subscriptions_of_same_callback() {
        let callback: Subscriber = Arc::new(|_msg: &Message| {});
        let a = Subscription::new(
            Weak::new(),
            "a".into(),
            Arc::clone(&callback),
            DispatchMode::Synchronous,
            true,
            None,
            Arc::new(AtomicU64::new(0)),
        );
        let b = Subscription::new(
            Weak::new(),
            "a.b".into(),
            Arc::clone(&callback),
            DispatchMode::Synchronous,
            false,
            None,
            Arc::new(AtomicU64::new(0)),
        );
        assert_eq!(a.subscriber_identity(), b.subscriber_identity());
        assert_ne!(a.subscriber_id(), b.subscriber_id());

        let other = test_subscription();
        assert_ne!(a.subscriber_identity(), other.subscriber_identity());
    }

    #[test]
    fn cancel_is_idempotent() {
        let sub = test_subscription();
        assert!(sub.is_active());
        sub.cancel();
        assert!(!sub.is_active());
        sub.cancel();
        assert!(!sub.is_active());
    }

    #[test]
    fn record_delivery_increments_count() {
        let sub = test_subscription();
        assert_eq!(sub.message_count(), 0);
        sub.record_delivery();
        sub.record_delivery();
        assert_eq!(sub.message_count(), 2);
    }
}
