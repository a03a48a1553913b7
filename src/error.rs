//! Unified error type for the bus.

use thiserror::Error;

/// Errors surfaced by the bus's API boundary.
///
/// Subscriber panics are not represented here: on the synchronous path they
/// propagate to the caller of [`crate::channel::Channel::send`] as a Rust
/// panic, and on the asynchronous path the dispatcher catches them and
/// reports them to the bus's internal log channel (see `dispatcher`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A channel name did not match the `IDENT(SEP IDENT)*` grammar.
    #[error("invalid channel name: {0:?}")]
    InvalidChannelName(String),

    /// [`crate::bus::MessageBus::get_channel`] was called with a name that
    /// is not currently registered.
    #[error("unknown channel: {0:?}")]
    UnknownChannel(String),

    /// [`crate::bus::MessageBus::create_new_channel`] was called with a name
    /// that is already registered.
    #[error("channel already exists: {0:?}")]
    ChannelAlreadyExists(String),

    /// A timed `put` on the dispatcher queue could not make room before its
    /// deadline elapsed.
    #[error("dispatcher queue full after waiting {timeout_secs}s")]
    QueueFullTimeout {
        /// How long the put call waited before giving up.
        timeout_secs: u64,
    },
}

/// Convenience alias for bus API results.
pub type Result<T> = std::result::Result<T, BusError>;
