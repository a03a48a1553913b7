//! The structured log record produced by a [`super::channel::LogChannel`].
//!
//! Field set confirmed against `examples/original_source/dss/log/Message.py`
//! (`_get_message_data_template`); the `has_been_delivered_to` dedup set
//! mirrors `Message.record_delivery` / `Message.has_been_delivered_to`, keyed
//! by the subscriber callback's own identity so the same callback reached
//! through two matching subscriptions (e.g. an ancestor wildcard plus a
//! direct descendant subscribe) is only counted once.

use std::cell::Cell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use super::levels;
use crate::channel::Message;
use crate::subscription::SubscriberIdentity;

static NEXT_NUMERIC_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static NUMERIC_THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// A small, process-stable numeric id for the current thread.
///
/// `std::thread::ThreadId` has no public integer representation, so this
/// assigns one lazily on first use per thread, purely for display in log
/// records.
pub fn numeric_thread_id() -> u64 {
    NUMERIC_THREAD_ID.with(|cell| {
        let current = cell.get();
        if current != 0 {
            return current;
        }
        let assigned = NEXT_NUMERIC_THREAD_ID.fetch_add(1, Ordering::SeqCst);
        cell.set(assigned);
        assigned
    })
}

/// Best-effort source location for a log call site.
///
/// Rust has no runtime stack-frame introspection, so this is captured via
/// `#[track_caller]` / `std::panic::Location` at the call site rather than
/// walked at log time (the idiomatic substitute for the original's stack
/// walk, per the design notes).
#[derive(Debug, Clone)]
pub struct CallerLocation {
    pub src_file: String,
    pub line_num: u32,
    pub caller: String,
    pub caller_code: String,
}

impl CallerLocation {
    /// Placeholder used when no real location is available.
    pub fn unspecified() -> Self {
        Self {
            src_file: "?".to_string(),
            line_num: 0,
            caller: "?".to_string(),
            caller_code: "?".to_string(),
        }
    }

    /// Captures the caller's file/line via `#[track_caller]`.
    ///
    /// `caller` (function name) and `caller_code` (source text of the call)
    /// are not recoverable without debug info or re-reading source files at
    /// runtime, so they default to `"?"`, matching the original's own
    /// fallback for frames it cannot resolve.
    #[track_caller]
    pub fn capture() -> Self {
        let location = std::panic::Location::caller();
        Self {
            src_file: location.file().to_string(),
            line_num: location.line(),
            caller: "?".to_string(),
            caller_code: "?".to_string(),
        }
    }
}

/// A structured log record.
pub struct LogMessage {
    pub level: u8,
    pub message: String,
    pub channel: String,
    pub timestamp: f64,
    pub thread_id: u64,
    pub location: CallerLocation,
    pub exc_info: Option<(String, String)>,
    delivered_to: Mutex<HashSet<SubscriberIdentity>>,
}

impl LogMessage {
    pub fn new(level: u8, channel: String, message: String, location: CallerLocation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            level,
            message,
            channel,
            timestamp,
            thread_id: numeric_thread_id(),
            location,
            exc_info: None,
            delivered_to: Mutex::new(HashSet::new()),
        }
    }

    /// Attaches exception context (type name, rendered text).
    pub fn with_exception(mut self, exc_type: String, exc_txt: String) -> Self {
        self.exc_info = Some((exc_type, exc_txt));
        self
    }

    /// The level's canonical name, e.g. `"ERROR"`.
    pub fn level_name(&self) -> &'static str {
        levels::level_name(self.level)
    }

    /// Whether this message has already been delivered to `identity`
    /// through some other matching subscription.
    pub fn has_been_delivered_to(&self, identity: SubscriberIdentity) -> bool {
        self.delivered_to.lock().unwrap().contains(&identity)
    }

    /// Records that this message has now been delivered to `identity`.
    pub fn record_delivery(&self, identity: SubscriberIdentity) {
        self.delivered_to.lock().unwrap().insert(identity);
    }
}

/// Checks and records log-delivery dedup for one subscriber about to
/// receive `msg`. Returns `true` if delivery should proceed. Non-`LogMessage`
/// payloads are never deduped and always return `true` — this mechanism is
/// specific to the log channel.
pub(crate) fn dedup_delivery(msg: &Message, identity: SubscriberIdentity) -> bool {
    match msg.downcast_ref::<LogMessage>() {
        Some(log_msg) => {
            if log_msg.has_been_delivered_to(identity) {
                false
            } else {
                log_msg.record_delivery(identity);
                true
            }
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_dedup_tracks_per_subscriber() {
        let msg = LogMessage::new(
            levels::INFO,
            "chan".to_string(),
            "hello".to_string(),
            CallerLocation::unspecified(),
        );
        assert!(!msg.has_been_delivered_to(42));
        msg.record_delivery(42);
        assert!(msg.has_been_delivered_to(42));
        assert!(!msg.has_been_delivered_to(7));
    }

    #[test]
    fn dedup_delivery_skips_repeat_delivery_of_log_messages_only() {
        let log_msg = LogMessage::new(
            levels::INFO,
            "chan".to_string(),
            "hello".to_string(),
            CallerLocation::unspecified(),
        );
        let boxed: Message = crate::channel::boxed_message(log_msg);
        assert!(dedup_delivery(&boxed, 1));
        assert!(!dedup_delivery(&boxed, 1));
        assert!(dedup_delivery(&boxed, 2));

        let plain: Message = crate::channel::boxed_message("not a log message".to_string());
        assert!(dedup_delivery(&plain, 1));
        assert!(dedup_delivery(&plain, 1));
    }

    #[test]
    fn numeric_thread_id_is_stable_per_thread() {
        let first = numeric_thread_id();
        let second = numeric_thread_id();
        assert_eq!(first, second);
    }
}
