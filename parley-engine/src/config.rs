//! Engine configuration.

use std::time::Duration;

/// Tunable parameters for the coordination engine.
///
/// All durations are plain `std::time::Duration` values; the defaults are
/// documented on each field.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Consultation timeout applied when `request_human_input` is called
    /// without an explicit override. Default: 300 seconds.
    pub default_timeout: Duration,

    /// Interval between supervisor sweeps. Live waiters time out on their
    /// own precise deadline; the sweep only bounds how long an *orphaned*
    /// request (waiter task gone) can stay open past its deadline, so the
    /// worst-case expiry overshoot for orphans is one interval.
    /// Default: 250 milliseconds.
    pub sweep_interval: Duration,

    /// How long terminal execution handles and closed consultation
    /// tombstones are retained for inspection before the supervisor
    /// garbage-collects them. Default: 60 seconds.
    pub retention: Duration,
}

impl EngineConfig {
    /// Set the default consultation timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the supervisor sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the retention window for terminal handles and tombstones.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_millis(250),
            retention: Duration::from_secs(60),
        }
    }
}
