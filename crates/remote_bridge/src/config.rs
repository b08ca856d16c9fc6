//! Bridge configuration.

use std::time::Duration;

/// Delay between the first live event of a batch and its flush.
pub const DEFAULT_LINGER: Duration = Duration::from_millis(10);

/// How long a live wait lasts before an empty heartbeat response.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a command waits for its first callback.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for command dispatch and long-poll sessions.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Coalescing window armed by the first live event of a batch.
    pub linger: Duration,
    /// Maximum live wait before a heartbeat flush.
    pub poll_timeout: Duration,
    /// Maximum wait for a `call` command's first callback.
    pub command_timeout: Duration,
    /// Maximum number of concurrently open long-poll sessions.
    pub max_sessions: usize,
    /// Subscriptions beyond this count in one request are dropped.
    pub max_subscriptions: usize,
    /// Capacity of each session's live event channel.
    pub listener_capacity: usize,
    /// Capacity of each command's callback channel.
    pub callback_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            linger: DEFAULT_LINGER,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_sessions: 1024,
            max_subscriptions: 64,
            listener_capacity: 256,
            callback_capacity: 64,
        }
    }
}

impl BridgeConfig {
    /// Override the linger window.
    #[must_use]
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Override the long-poll timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Override the command callback timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Override the session limit.
    #[must_use]
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Override the per-request subscription limit.
    #[must_use]
    pub fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    /// Override the live event channel capacity. Clamped to at least 1.
    #[must_use]
    pub fn with_listener_capacity(mut self, capacity: usize) -> Self {
        self.listener_capacity = capacity.max(1);
        self
    }

    /// Override the command callback channel capacity. Clamped to at least 1.
    #[must_use]
    pub fn with_callback_capacity(mut self, capacity: usize) -> Self {
        self.callback_capacity = capacity.max(1);
        self
    }
}
