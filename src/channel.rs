//! Channels: nodes in the name-tree that own subscription lists and perform
//! dispatch.
//!
//! Grounded on `server/src/data/topics/memory.rs`'s `RwLock`-guarded maps and
//! `Arc`-wrapped node handles; the effective-subscription-set cache below is
//! grounded on `server/src/data/topics/pubsub.rs::PubSubManager::get_or_create_bridge`'s
//! read-fast-path/write-slow-path pattern, adapted from "bridge exists" to
//! "cached ancestor list is still current".

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::subscription::{DispatchMode, Subscriber, Subscription};

/// An opaque message payload. Publishers hand the bus a value of any
/// `Send + Sync + 'static` type; subscribers downcast it back via
/// [`std::any::Any`] if they need the concrete type.
pub type Message = Arc<dyn Any + Send + Sync>;

/// Wraps a value as a [`Message`].
pub fn boxed_message<T: Any + Send + Sync>(value: T) -> Message {
    Arc::new(value)
}

/// A subscription paired with the message queued for it.
pub(crate) type DispatchItem = (Arc<Subscription>, Message);

/// The bus-side operations a channel needs without depending on the concrete
/// `MessageBus` type, breaking the otherwise-circular `channel <-> bus`
/// dependency.
pub(crate) trait BusContext: Send + Sync {
    fn is_running(&self) -> bool;
    fn dedicated_thread_mode(&self) -> bool;
    fn enqueue(&self, item: DispatchItem);
    fn log_subscriber_panic(&self, channel: &str, payload: Box<dyn Any + Send>);
}

#[derive(Default)]
struct EffectiveSnapshot {
    sync: Vec<Arc<Subscription>>,
    asyn: Vec<Arc<Subscription>>,
}

impl EffectiveSnapshot {
    fn for_mode(&self, mode: DispatchMode) -> Vec<Arc<Subscription>> {
        match mode {
            DispatchMode::Synchronous => self.sync.clone(),
            DispatchMode::Asynchronous => self.asyn.clone(),
        }
    }
}

/// A named node in the channel hierarchy.
///
/// Only constructed through a [`crate::bus::MessageBus`]; a channel created
/// out of band would not be reachable by name and so is not representable
/// here (there is no public constructor).
pub struct Channel {
    name: String,
    parent: Option<Weak<Channel>>,
    bus: Weak<dyn BusContext>,
    children: Mutex<Vec<Arc<Channel>>>,
    sync_subs: Mutex<Vec<Arc<Subscription>>>,
    async_subs: Mutex<Vec<Arc<Subscription>>>,
    message_count: AtomicU64,
    epoch: Arc<AtomicU64>,
    effective_cache: Mutex<Option<(u64, EffectiveSnapshot)>>,
}

impl Channel {
    pub(crate) fn new_root(bus: Weak<dyn BusContext>, epoch: Arc<AtomicU64>) -> Arc<Channel> {
        Arc::new(Channel {
            name: crate::constants::ROOT_CHANNEL_NAME.to_string(),
            parent: None,
            bus,
            children: Mutex::new(Vec::new()),
            sync_subs: Mutex::new(Vec::new()),
            async_subs: Mutex::new(Vec::new()),
            message_count: AtomicU64::new(0),
            epoch,
            effective_cache: Mutex::new(None),
        })
    }

    pub(crate) fn new_child(
        name: String,
        parent: &Arc<Channel>,
        bus: Weak<dyn BusContext>,
        epoch: Arc<AtomicU64>,
    ) -> Arc<Channel> {
        let child = Arc::new(Channel {
            name,
            parent: Some(Arc::downgrade(parent)),
            bus,
            children: Mutex::new(Vec::new()),
            sync_subs: Mutex::new(Vec::new()),
            async_subs: Mutex::new(Vec::new()),
            message_count: AtomicU64::new(0),
            epoch,
            effective_cache: Mutex::new(None),
        });
        parent.children.lock().push(Arc::clone(&child));
        child
    }

    /// The channel's full dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent channel, if any (`root` has none).
    pub fn parent(&self) -> Option<Arc<Channel>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Names of the direct child channels.
    pub fn child_names(&self) -> Vec<String> {
        self.children
            .lock()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Total `send` calls on this channel, regardless of subscriber
    /// filtering.
    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    /// True iff a local or inherited wildcard subscription of either mode
    /// covers this channel.
    pub fn has_subscriptions(&self) -> bool {
        self.has_sync_subscriptions() || self.has_async_subscriptions()
    }

    /// True iff a local or inherited wildcard synchronous subscription
    /// covers this channel.
    pub fn has_sync_subscriptions(&self) -> bool {
        !self.effective_subscriptions(DispatchMode::Synchronous).is_empty()
    }

    /// True iff a local or inherited wildcard asynchronous subscription
    /// covers this channel.
    pub fn has_async_subscriptions(&self) -> bool {
        !self.effective_subscriptions(DispatchMode::Asynchronous).is_empty()
    }

    /// Registers a new subscriber on this channel.
    pub fn subscribe(
        self: &Arc<Self>,
        subscriber: Subscriber,
        include_subchannels: bool,
        mode: DispatchMode,
        thread_id: Option<ThreadId>,
    ) -> Arc<Subscription> {
        let sub = Arc::new(Subscription::new(
            Arc::downgrade(self),
            self.name.clone(),
            subscriber,
            mode,
            include_subchannels,
            thread_id,
            Arc::clone(&self.epoch),
        ));
        match mode {
            DispatchMode::Synchronous => self.sync_subs.lock().push(Arc::clone(&sub)),
            DispatchMode::Asynchronous => self.async_subs.lock().push(Arc::clone(&sub)),
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        sub
    }

    pub(crate) fn remove_subscription(&self, id: u64, mode: DispatchMode) {
        let list = match mode {
            DispatchMode::Synchronous => &self.sync_subs,
            DispatchMode::Asynchronous => &self.async_subs,
        };
        list.lock().retain(|s| s.subscriber_id() != id);
    }

    /// Publishes `msg` to this channel: the synchronous pass runs inline on
    /// the caller's thread, then asynchronous subscribers are either
    /// enqueued onto the dispatcher (dedicated-thread mode) or invoked
    /// inline right after (non-dedicated mode).
    pub fn send(self: &Arc<Self>, msg: Message) {
        self.message_count.fetch_add(1, Ordering::SeqCst);

        let bus = match self.bus.upgrade() {
            Some(bus) => bus,
            None => return,
        };
        if !bus.is_running() {
            return;
        }

        let sender_thread = thread::current().id();

        for sub in self.effective_subscriptions(DispatchMode::Synchronous) {
            if !sub.is_active() || !thread_matches(&sub, sender_thread) {
                continue;
            }
            if !crate::log::message::dedup_delivery(&msg, sub.subscriber_identity()) {
                continue;
            }
            let subscriber = sub.subscriber();
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (*subscriber)(&msg)));
            sub.record_delivery();
            if let Err(payload) = result {
                std::panic::resume_unwind(payload);
            }
        }

        let dedicated = bus.dedicated_thread_mode();
        for sub in self.effective_subscriptions(DispatchMode::Asynchronous) {
            if !sub.is_active() || !thread_matches(&sub, sender_thread) {
                continue;
            }
            if dedicated {
                bus.enqueue((Arc::clone(&sub), Arc::clone(&msg)));
            } else {
                if !crate::log::message::dedup_delivery(&msg, sub.subscriber_identity()) {
                    continue;
                }
                let subscriber = sub.subscriber();
                let result =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (*subscriber)(&msg)));
                sub.record_delivery();
                if let Err(payload) = result {
                    bus.log_subscriber_panic(&self.name, payload);
                }
            }
        }
    }

    fn effective_subscriptions(&self, mode: DispatchMode) -> Vec<Arc<Subscription>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        {
            let cache = self.effective_cache.lock();
            if let Some((cached_epoch, snapshot)) = cache.as_ref() {
                if *cached_epoch == epoch {
                    return snapshot.for_mode(mode);
                }
            }
        }
        let snapshot = self.compute_effective();
        let result = snapshot.for_mode(mode);
        *self.effective_cache.lock() = Some((epoch, snapshot));
        result
    }

    fn compute_effective(&self) -> EffectiveSnapshot {
        let mut sync = self.sync_subs.lock().clone();
        let mut asyn = self.async_subs.lock().clone();

        let mut ancestor = self.parent();
        while let Some(parent) = ancestor {
            for s in parent.sync_subs.lock().iter() {
                if s.include_subchannels() && s.is_active() {
                    sync.push(Arc::clone(s));
                }
            }
            for s in parent.async_subs.lock().iter() {
                if s.include_subchannels() && s.is_active() {
                    asyn.push(Arc::clone(s));
                }
            }
            ancestor = parent.parent();
        }

        EffectiveSnapshot { sync, asyn }
    }
}

fn thread_matches(sub: &Subscription, sender_thread: ThreadId) -> bool {
    match sub.thread_id() {
        None => true,
        Some(tid) => tid == sender_thread,
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("message_count", &self.message_count())
            .finish()
    }
}
