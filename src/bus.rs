//! The bus: registry of channels, owner of the dispatcher, lifecycle root.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::channel::{BusContext, Channel, DispatchItem};
use crate::config::BusConfig;
use crate::constants;
use crate::dispatcher::{Dispatcher, QueueItem};
use crate::error::{BusError, Result};
use crate::log::channel::LogChannel;
use crate::queue::BlockingQueue;
use crate::subscription::{DispatchMode, Subscriber, Subscription};

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

type Registry = StdMutex<HashMap<u64, Weak<BusInner>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| StdMutex::new(HashMap::new()))
}

fn register(id: u64, inner: Weak<BusInner>) {
    registry().lock().unwrap().insert(id, inner);
}

fn deregister(id: u64) {
    registry().lock().unwrap().remove(&id);
}

/// Number of buses currently registered as running. Mirrors the length of
/// the process-wide `RUNNING_MESSAGE_BUS_INSTANCES` registry.
pub fn running_message_bus_count() -> usize {
    registry().lock().unwrap().len()
}

/// Stops every currently running [`MessageBus`], mirroring the original's
/// process-wide `stop_all_message_buses()`.
pub fn stop_all_message_buses() {
    let snapshot: Vec<Weak<BusInner>> = registry().lock().unwrap().values().cloned().collect();
    for weak in snapshot {
        if let Some(inner) = weak.upgrade() {
            MessageBus { inner }.stop();
        }
    }
}

struct BusInner {
    id: u64,
    name_separator: char,
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    root: Arc<Channel>,
    internal_log: Arc<LogChannel>,
    self_ctx: Weak<dyn BusContext>,
    epoch: Arc<AtomicU64>,
    dispatcher_queue: Arc<BlockingQueue<QueueItem>>,
    dispatcher: StdMutex<Option<Dispatcher>>,
    running: AtomicBool,
    dedicated_thread_mode: AtomicBool,
    start_time: StdMutex<Option<Instant>>,
}

impl BusContext for BusInner {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn dedicated_thread_mode(&self) -> bool {
        self.dedicated_thread_mode.load(Ordering::SeqCst)
    }

    fn enqueue(&self, item: DispatchItem) {
        self.dispatcher_queue.put(QueueItem::Deliver(item));
    }

    fn log_subscriber_panic(&self, channel: &str, payload: Box<dyn Any + Send>) {
        self.internal_log.report_panic(channel, payload);
    }
}

/// Registry of channels, validator of names, owner of the dispatcher and its
/// queue; the lifecycle root of the whole bus.
///
/// Cheap to clone: internally an `Arc`, so all clones refer to the same bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Builds a bus using environment-derived defaults (see [`BusConfig`]).
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Starts a config builder for constructing a bus with overrides.
    pub fn builder() -> crate::config::BusConfigBuilder {
        BusConfig::builder()
    }

    /// Builds a bus from an explicit configuration.
    pub fn with_config(config: BusConfig) -> Self {
        let id = NEXT_BUS_ID.fetch_add(1, Ordering::SeqCst);
        let epoch = Arc::new(AtomicU64::new(0));
        let dispatcher_queue = Arc::new(BlockingQueue::new(config.max_queue_size));

        let inner = Arc::new_cyclic(|weak: &Weak<BusInner>| {
            let bus_ctx: Weak<dyn BusContext> = weak.clone();
            let root = Channel::new_root(bus_ctx.clone(), Arc::clone(&epoch));
            let internal_log_channel = Channel::new_child(
                constants::INTERNAL_LOG_CHANNEL_NAME.to_string(),
                &root,
                bus_ctx.clone(),
                Arc::clone(&epoch),
            );
            let internal_log = Arc::new(LogChannel::new(Arc::clone(&internal_log_channel)));

            let mut channels = HashMap::new();
            channels.insert(constants::ROOT_CHANNEL_NAME.to_string(), Arc::clone(&root));
            channels.insert(
                constants::INTERNAL_LOG_CHANNEL_NAME.to_string(),
                internal_log_channel,
            );

            BusInner {
                id,
                name_separator: config.name_separator,
                channels: RwLock::new(channels),
                root,
                internal_log,
                self_ctx: bus_ctx,
                epoch,
                dispatcher_queue,
                dispatcher: StdMutex::new(None),
                running: AtomicBool::new(false),
                dedicated_thread_mode: AtomicBool::new(config.dedicated_thread_mode),
                start_time: StdMutex::new(None),
            }
        });

        MessageBus { inner }
    }

    /// Idempotent: a second call returns without error.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.start_time.lock().unwrap() = Some(Instant::now());
        if self.inner.dedicated_thread_mode.load(Ordering::SeqCst) {
            self.spawn_dispatcher();
        }
        register(self.inner.id, Arc::downgrade(&self.inner));
    }

    /// Idempotent. Safe to call from any thread, including from within a
    /// subscriber callback running on the dispatcher thread itself — in
    /// that case shutdown is scheduled rather than joined inline, since a
    /// thread cannot join itself.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        deregister(self.inner.id);

        let dispatcher = self.inner.dispatcher.lock().unwrap().take();
        if let Some(dispatcher) = dispatcher {
            if dispatcher.is_current_thread() {
                dispatcher.signal_shutdown();
            } else {
                dispatcher.stop(Duration::from_secs(constants::DISPATCHER_JOIN_TIMEOUT_SECS));
            }
        }
    }

    /// Switches a non-dedicated bus into dedicated-thread mode, spawning the
    /// worker if the bus is already running and has none yet.
    pub fn turn_on_dedicated_thread_mode(&self) {
        let was_on = self.inner.dedicated_thread_mode.swap(true, Ordering::SeqCst);
        if !was_on
            && self.inner.running.load(Ordering::SeqCst)
            && self.inner.dispatcher.lock().unwrap().is_none()
        {
            self.spawn_dispatcher();
        }
    }

    fn spawn_dispatcher(&self) {
        let dispatcher = Dispatcher::spawn(
            Arc::clone(&self.inner.dispatcher_queue),
            Arc::clone(&self.inner.internal_log),
        );
        *self.inner.dispatcher.lock().unwrap() = Some(dispatcher);
    }

    /// Whether the bus is currently started.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// The monotonic instant [`Self::start`] was last called, if running.
    pub fn start_time(&self) -> Option<Instant> {
        *self.inner.start_time.lock().unwrap()
    }

    /// The distinguished root channel.
    pub fn root_channel(&self) -> Arc<Channel> {
        Arc::clone(&self.inner.root)
    }

    /// Pure predicate: does `name` match the `IDENT(SEP IDENT)*` grammar?
    pub fn is_valid_channel_name(&self, name: &str) -> bool {
        is_valid_channel_name(name, self.inner.name_separator)
    }

    /// Creates `name`, creating any missing ancestor channels silently.
    /// Fails if `name` is malformed or already registered.
    pub fn create_new_channel(&self, name: &str) -> Result<Arc<Channel>> {
        if !self.is_valid_channel_name(name) {
            return Err(BusError::InvalidChannelName(name.to_string()));
        }

        let mut channels = self.inner.channels.write();
        if channels.contains_key(name) {
            return Err(BusError::ChannelAlreadyExists(name.to_string()));
        }

        let mut parent = Arc::clone(&self.inner.root);
        let mut path = String::new();
        for (i, segment) in name.split(self.inner.name_separator).enumerate() {
            if i > 0 {
                path.push(self.inner.name_separator);
            }
            path.push_str(segment);

            if let Some(existing) = channels.get(&path) {
                parent = Arc::clone(existing);
                continue;
            }
            let child = Channel::new_child(
                path.clone(),
                &parent,
                self.inner.self_ctx.clone(),
                Arc::clone(&self.inner.epoch),
            );
            channels.insert(path.clone(), Arc::clone(&child));
            parent = child;
        }

        Ok(parent)
    }

    /// Looks up a channel by name.
    pub fn get_channel(&self, name: &str) -> Result<Arc<Channel>> {
        if !self.is_valid_channel_name(name) {
            return Err(BusError::InvalidChannelName(name.to_string()));
        }
        self.inner
            .channels
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::UnknownChannel(name.to_string()))
    }

    /// Names of every channel currently registered on this bus.
    pub fn get_open_channel_names(&self) -> Vec<String> {
        self.inner.channels.read().keys().cloned().collect()
    }

    /// Convenience wrapper resolving `channel_name` then delegating to
    /// [`Channel::subscribe`].
    pub fn subscribe(
        &self,
        channel_name: &str,
        subscriber: Subscriber,
        include_subchannels: bool,
        mode: DispatchMode,
        thread_id: Option<ThreadId>,
    ) -> Result<Arc<Subscription>> {
        let channel = self.get_channel(channel_name)?;
        Ok(channel.subscribe(subscriber, include_subchannels, mode, thread_id))
    }

    /// The bus's internal log channel, used to report dispatcher-caught
    /// subscriber panics. Exposed so embedding applications can subscribe
    /// to it too.
    pub fn internal_log(&self) -> Arc<LogChannel> {
        Arc::clone(&self.inner.internal_log)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            self.stop();
        }
    }
}

/// Validates `name` against `IDENT(SEP IDENT)*`, `IDENT = [A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_channel_name(name: &str, separator: char) -> bool {
    if name.is_empty() {
        return false;
    }
    name.split(separator).all(is_valid_ident)
}

fn is_valid_ident(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation_matches_source_grammar() {
        for valid in ["foo", "foo.bar", "_x", "a.b.c.d", "_", "foo_a", "foo123"] {
            assert!(is_valid_channel_name(valid, '.'), "{valid} should be valid");
        }
        for invalid in ["..foo", "*", ".", "98", "top.98", "foo.", ".foo", "98_"] {
            assert!(
                !is_valid_channel_name(invalid, '.'),
                "{invalid} should be invalid"
            );
        }
    }

    #[test]
    fn duplicate_create_is_case_sensitive() {
        let bus = MessageBus::new();
        bus.start();
        assert!(bus.create_new_channel("X").is_ok());
        assert!(matches!(
            bus.create_new_channel("X"),
            Err(BusError::ChannelAlreadyExists(_))
        ));
        assert!(bus.create_new_channel("x").is_ok());
        bus.stop();
    }

    #[test]
    fn create_new_channel_creates_ancestors_eagerly() {
        let bus = MessageBus::new();
        bus.start();
        bus.create_new_channel("a.b.c").unwrap();
        assert!(bus.get_channel("a").is_ok());
        assert!(bus.get_channel("a.b").is_ok());
        assert!(bus.get_channel("a.b.c").is_ok());
        bus.stop();
    }

    #[test]
    fn stop_all_message_buses_clears_registry() {
        let before = running_message_bus_count();
        let buses: Vec<MessageBus> = (0..20)
            .map(|_| {
                let config = MessageBus::builder().dedicated_thread_mode(true).build();
                let bus = MessageBus::with_config(config);
                bus.start();
                bus
            })
            .collect();
        assert_eq!(running_message_bus_count(), before + 20);
        stop_all_message_buses();
        for bus in &buses {
            assert!(!bus.is_running());
        }
    }
}
