use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Weight of the newest sample in the running transaction-time average.
const AVERAGE_WEIGHT: f64 = 0.002;

/// Per-connection transaction counters.
///
/// Owned by one connection; reset only through [`Statistics::reset`] or
/// [`Statistics::reset_timing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub commands: u64,
    pub setpoint_updates: u64,
    pub retries: u64,
    pub no_replies: u64,
    pub bad_replies: u64,
    pub rejections: u64,
    /// Running average of completed exchanges, in seconds.
    pub time_avg: f64,
    /// Slowest completed exchange, in seconds.
    pub time_max: f64,
}

impl Statistics {
    pub(crate) fn record_time(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs > self.time_max {
            self.time_max = secs;
        }
        self.time_avg = if self.time_avg == 0.0 {
            secs
        } else {
            self.time_avg * (1.0 - AVERAGE_WEIGHT) + secs * AVERAGE_WEIGHT
        };
    }

    /// Multi-line human-readable summary of the counters.
    pub fn report(&self) -> String {
        self.to_string()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Clear only the timing figures, keeping the counters.
    pub fn reset_timing(&mut self) {
        self.time_avg = 0.0;
        self.time_max = 0.0;
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Transaction time avg:{:.3e} max:{:.3e}",
            self.time_avg, self.time_max
        )?;
        writeln!(f, "         Command count: {}", self.commands)?;
        writeln!(f, " Setpoint update count: {}", self.setpoint_updates)?;
        writeln!(f, "           Retry count: {}", self.retries)?;
        writeln!(f, "        No reply count: {}", self.no_replies)?;
        writeln!(f, "       Bad reply count: {}", self.bad_replies)?;
        write!(f, "       Rejection count: {}", self.rejections)
    }
}
