//! An in-process publish/subscribe message bus.
//!
//! Channels form a dotted-name hierarchy (`"a.b.c"`); subscribers attach
//! synchronously (invoked inline on the publisher's thread) or
//! asynchronously (invoked on a single dedicated dispatcher thread), with
//! optional thread-locality and wildcard subtree coverage. A [`log`]
//! specialisation sits on top, giving level-tagged structured records with
//! a pluggable text [`log::Formatter`].
//!
//! ```
//! use bus::{DispatchMode, MessageBus};
//! use std::sync::{Arc, Mutex};
//!
//! let bus = MessageBus::new();
//! bus.start();
//! bus.create_new_channel("greetings").unwrap();
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&received);
//! bus.subscribe(
//!     "greetings",
//!     Arc::new(move |msg: &bus::Message| {
//!         if let Some(text) = msg.downcast_ref::<String>() {
//!             sink.lock().unwrap().push(text.clone());
//!         }
//!     }),
//!     false,
//!     DispatchMode::Synchronous,
//!     None,
//! ).unwrap();
//!
//! bus.get_channel("greetings")
//!     .unwrap()
//!     .send(bus::boxed_message("hello".to_string()));
//!
//! assert_eq!(*received.lock().unwrap(), vec!["hello".to_string()]);
//! bus.stop();
//! ```

mod bus;
mod channel;
mod config;
mod constants;
mod dispatcher;
mod error;
mod lock;
pub mod log;
mod queue;
mod subscription;

#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use bus::{is_valid_channel_name, running_message_bus_count, stop_all_message_buses, MessageBus};
pub use channel::{boxed_message, Channel, Message};
pub use config::{BusConfig, BusConfigBuilder};
pub use error::{BusError, Result};
pub use lock::Lock;
pub use queue::BlockingQueue;
pub use subscription::{DispatchMode, Subscriber, SubscriberId, Subscription};
