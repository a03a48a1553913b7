//! The log-channel specialisation: structured records, level constants, and
//! a text formatter, layered on top of the plain [`crate::channel::Channel`].

pub mod channel;
pub mod formatter;
pub mod levels;
pub mod message;

pub use channel::LogChannel;
pub use formatter::Formatter;
pub use message::{CallerLocation, LogMessage};
