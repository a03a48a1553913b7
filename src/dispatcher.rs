//! The single background worker that drains the bus-wide asynchronous
//! dispatch queue.
//!
//! The drain-then-shut-down ordering is grounded on
//! `server/src/core/shutdown.rs::ShutdownService::shutdown` (finish queued
//! work, then tear down); the worker-thread spawn/join/sentinel shape itself
//! is enriched from `DanDo385-rust-edu`'s `labs/29-thread-pool` `Worker`,
//! since nothing in this style of codebase has a std-thread worker of its
//! own to crib from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::channel::DispatchItem;
use crate::log::channel::{panic_payload_to_string, LogChannel};
use crate::queue::BlockingQueue;

/// An item pulled off the dispatcher queue: either a subscription/message
/// pair to deliver, or the sentinel that tells the worker to exit.
pub(crate) enum QueueItem {
    Deliver(DispatchItem),
    Shutdown,
}

/// Owns the dispatcher's worker thread and counters.
pub(crate) struct Dispatcher {
    queue: Arc<BlockingQueue<QueueItem>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    worker_thread_id: Mutex<Option<ThreadId>>,
    dispatch_count: Arc<AtomicU64>,
    message_count: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Spawns the worker thread immediately.
    pub(crate) fn spawn(queue: Arc<BlockingQueue<QueueItem>>, log: Arc<LogChannel>) -> Self {
        let dispatch_count = Arc::new(AtomicU64::new(0));
        let message_count = Arc::new(AtomicU64::new(0));
        let worker_thread_id = Mutex::new(None);

        let loop_queue = Arc::clone(&queue);
        let loop_dispatch_count = Arc::clone(&dispatch_count);
        let loop_message_count = Arc::clone(&message_count);
        let handle = thread::Builder::new()
            .name("bus-dispatcher".to_string())
            .spawn(move || run(loop_queue, log, loop_dispatch_count, loop_message_count))
            .expect("failed to spawn dispatcher thread");

        *worker_thread_id.lock().unwrap() = Some(handle.thread().id());

        Self {
            queue,
            handle: Mutex::new(Some(handle)),
            worker_thread_id,
            dispatch_count,
            message_count,
        }
    }

    /// Total items pulled off the queue (including inactive subscriptions).
    pub(crate) fn dispatch_count(&self) -> u64 {
        self.dispatch_count.load(Ordering::SeqCst)
    }

    /// Total messages dequeued; tracked alongside `dispatch_count` to mirror
    /// the two distinct counters named in the component design.
    pub(crate) fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    /// True if called from the dispatcher's own worker thread.
    pub(crate) fn is_current_thread(&self) -> bool {
        *self.worker_thread_id.lock().unwrap() == Some(thread::current().id())
    }

    /// Enqueues the shutdown sentinel without waiting for the worker to
    /// exit. Safe to call from the worker thread itself.
    pub(crate) fn signal_shutdown(&self) {
        self.queue.put(QueueItem::Shutdown);
    }

    /// Enqueues the shutdown sentinel and waits (up to `timeout`) for the
    /// worker to exit before giving up and detaching it.
    pub(crate) fn stop(self, timeout: Duration) {
        self.queue.put(QueueItem::Shutdown);
        let handle = match self.handle.lock().unwrap().take() {
            Some(handle) => handle,
            None => return,
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "dispatcher did not shut down within the bounded wait"
            );
        }
    }
}

fn run(
    queue: Arc<BlockingQueue<QueueItem>>,
    log: Arc<LogChannel>,
    dispatch_count: Arc<AtomicU64>,
    message_count: Arc<AtomicU64>,
) {
    loop {
        match queue.get() {
            QueueItem::Shutdown => break,
            QueueItem::Deliver((sub, msg)) => {
                dispatch_count.fetch_add(1, Ordering::SeqCst);
                message_count.fetch_add(1, Ordering::SeqCst);
                if !sub.is_active() {
                    continue;
                }
                if !crate::log::message::dedup_delivery(&msg, sub.subscriber_identity()) {
                    continue;
                }
                let subscriber = sub.subscriber();
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    (*subscriber)(&msg)
                }));
                sub.record_delivery();
                if let Err(payload) = result {
                    let text = panic_payload_to_string(payload);
                    tracing::error!(channel = sub.channel_name(), %text, "async subscriber panicked");
                    log.report_panic_text(sub.channel_name(), text);
                }
            }
        }
    }
}
