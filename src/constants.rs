//! Named defaults and environment variable keys for the bus.

// =============================================================================
// Channel naming
// =============================================================================

/// Default hierarchical name separator.
pub const DEFAULT_NAME_SEPARATOR: char = '.';

/// Name of the distinguished root channel.
pub const ROOT_CHANNEL_NAME: &str = "root";

/// Name of the bus's internal log channel, used to report dispatcher-side
/// subscriber errors.
pub const INTERNAL_LOG_CHANNEL_NAME: &str = "_internal_log";

// =============================================================================
// Dispatcher / queue
// =============================================================================

/// Environment variable overriding the dispatcher queue's bound.
///
/// `0` means unbounded, matching [`crate::config::BusConfig::max_queue_size`].
pub const ENV_BUS_MAX_QUEUE_SIZE: &str = "BUS_MAX_QUEUE_SIZE";

/// Default dispatcher queue bound (unbounded).
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 0;

/// Environment variable overriding the channel name separator.
pub const ENV_BUS_NAME_SEPARATOR: &str = "BUS_NAME_SEPARATOR";

/// Environment variable toggling dedicated-thread dispatch mode.
pub const ENV_BUS_DEDICATED_THREAD_MODE: &str = "BUS_DEDICATED_THREAD_MODE";

/// Default dedicated-thread mode.
pub const DEFAULT_DEDICATED_THREAD_MODE: bool = false;

/// How long [`crate::bus::MessageBus::stop`] waits for the dispatcher thread
/// to join before giving up.
pub const DISPATCHER_JOIN_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Logging
// =============================================================================

/// Environment variable for the tracing filter used by [`crate::telemetry::init`].
pub const ENV_BUS_LOG: &str = "BUS_LOG";

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "info";
