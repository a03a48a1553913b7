//! A channel specialised with level-tagged send methods.

use std::any::Any;
use std::sync::Arc;

use crate::channel::{boxed_message, Channel};

use super::formatter::Formatter;
use super::levels;
use super::message::{CallerLocation, LogMessage};

/// Converts a caught panic payload to human-readable text.
pub(crate) fn panic_payload_to_string(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "subscriber panicked with a non-string payload".to_string()
    }
}

/// A channel that produces structured [`LogMessage`] records instead of
/// arbitrary payloads, with a shortcut method per level.
pub struct LogChannel {
    channel: Arc<Channel>,
    formatter: Formatter,
}

impl LogChannel {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self {
            channel,
            formatter: Formatter::default(),
        }
    }

    pub fn with_formatter(channel: Arc<Channel>, formatter: Formatter) -> Self {
        Self { channel, formatter }
    }

    /// The underlying channel, for subscribing or introspection.
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    /// The formatter used to render records from this channel to text.
    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    fn log(&self, level: u8, location: CallerLocation, message: String) {
        let record = LogMessage::new(level, self.channel.name().to_string(), message, location);
        self.channel.send(boxed_message(record));
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(levels::DEBUG, CallerLocation::capture(), message.into());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(levels::INFO, CallerLocation::capture(), message.into());
    }

    #[track_caller]
    pub fn notice(&self, message: impl Into<String>) {
        self.log(levels::NOTICE, CallerLocation::capture(), message.into());
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(levels::WARNING, CallerLocation::capture(), message.into());
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(levels::ERROR, CallerLocation::capture(), message.into());
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(levels::CRITICAL, CallerLocation::capture(), message.into());
    }

    /// Logs at `ERROR` with attached exception context.
    #[track_caller]
    pub fn exception(
        &self,
        message: impl Into<String>,
        exc_type: impl Into<String>,
        exc_txt: impl Into<String>,
    ) {
        let record = LogMessage::new(
            levels::ERROR,
            self.channel.name().to_string(),
            message.into(),
            CallerLocation::capture(),
        )
        .with_exception(exc_type.into(), exc_txt.into());
        self.channel.send(boxed_message(record));
    }

    /// Reports a caught subscriber panic from `source_channel`. Used by the
    /// dispatcher and by non-dedicated-thread inline async dispatch.
    pub(crate) fn report_panic(&self, source_channel: &str, payload: Box<dyn Any + Send>) {
        self.report_panic_text(source_channel, panic_payload_to_string(payload));
    }

    pub(crate) fn report_panic_text(&self, source_channel: &str, text: String) {
        let record = LogMessage::new(
            levels::ERROR,
            self.channel.name().to_string(),
            format!("subscriber panicked on channel {source_channel:?}"),
            CallerLocation::unspecified(),
        )
        .with_exception("panic".to_string(), text);
        self.channel.send(boxed_message(record));
    }
}
