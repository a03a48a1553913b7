//! Bus configuration, overridable by environment variables.
//!
//! Grounded on `server/src/core/config.rs`'s manual `std::env::var` reads
//! (the `config` crate declared in the workspace manifest is never actually
//! imported anywhere, so that dependency is not carried here — see
//! DESIGN.md).

use std::env;

use crate::constants;

/// Resolved configuration for a [`crate::bus::MessageBus`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub(crate) max_queue_size: usize,
    pub(crate) name_separator: char,
    pub(crate) dedicated_thread_mode: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_queue_size: env_usize(
                constants::ENV_BUS_MAX_QUEUE_SIZE,
                constants::DEFAULT_MAX_QUEUE_SIZE,
            ),
            name_separator: env_char(
                constants::ENV_BUS_NAME_SEPARATOR,
                constants::DEFAULT_NAME_SEPARATOR,
            ),
            dedicated_thread_mode: env_bool(
                constants::ENV_BUS_DEDICATED_THREAD_MODE,
                constants::DEFAULT_DEDICATED_THREAD_MODE,
            ),
        }
    }
}

impl BusConfig {
    /// Starts a builder seeded with the environment-derived defaults.
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder::default()
    }
}

/// Builder for [`BusConfig`].
#[derive(Debug, Clone, Default)]
pub struct BusConfigBuilder {
    config: BusConfig,
}

impl BusConfigBuilder {
    /// Bound on the dispatcher queue. `0` means unbounded.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    /// The character partitioning hierarchical channel names.
    pub fn name_separator(mut self, separator: char) -> Self {
        self.config.name_separator = separator;
        self
    }

    /// Whether the bus starts in dedicated-thread dispatch mode.
    pub fn dedicated_thread_mode(mut self, enabled: bool) -> Self {
        self.config.dedicated_thread_mode = enabled;
        self
    }

    pub fn build(self) -> BusConfig {
        self.config
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_char(key: &str, default: char) -> char {
    env::var(key)
        .ok()
        .and_then(|v| v.chars().next())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
