#![forbid(unsafe_code)]

//! Runtime configuration.

use std::time::Duration;

/// How a notification cycle reacts to a failing view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    /// Stop at the first failing view; later views are not rendered.
    #[default]
    FailFast,
    /// Render every live view and report all failures together.
    Isolate,
}

/// Configuration for a [`Controller`](crate::Controller) and the views it
/// wires.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interval of the repeating timer started by the start trigger.
    pub tick_interval: Duration,
    /// Failure handling for model notifications.
    pub notify_policy: NotifyPolicy,
    /// Display target the view presents on.
    pub display_target: String,
}

/// Default timer interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Shortest tick interval a timer will run at.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Default display target.
pub const DEFAULT_DISPLAY_TARGET: &str = "counter-container";

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            notify_policy: NotifyPolicy::default(),
            display_target: DEFAULT_DISPLAY_TARGET.to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Set the timer interval. Zero is clamped to one millisecond so the
    /// timer thread never spins.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    #[must_use]
    pub fn with_notify_policy(mut self, policy: NotifyPolicy) -> Self {
        self.notify_policy = policy;
        self
    }

    #[must_use]
    pub fn with_display_target(mut self, target: impl Into<String>) -> Self {
        self.display_target = target.into();
        self
    }
}
