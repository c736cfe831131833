/*!
 * Wait/Notify Types
 * Keys, timeouts, wake counts, and outcomes shared by the engines
 */

use crate::region::RegionId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One logical wait location: a region identity plus a byte offset.
///
/// Operations on the same key contend on the same FIFO queue; operations on
/// different keys never interfere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitKey {
    pub region: RegionId,
    pub offset: usize,
}

impl WaitKey {
    pub fn new(region: RegionId, offset: usize) -> Self {
        Self { region, offset }
    }
}

/// Outcome of a wait operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    /// Woken by notify
    Ok,
    /// Value check failed; the caller never parked
    NotEqual,
    /// Deadline elapsed while parked (or the timeout was already expired)
    TimedOut,
}

/// A wait deadline relative to the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeout {
    /// Wait until notified, however long that takes
    Infinite,
    /// Wait at most this long; zero means a single check with no parking
    Bounded(Duration),
}

impl Timeout {
    /// Normalize a caller-supplied millisecond count.
    ///
    /// `NaN` and `+inf` mean infinite; negative values are already expired.
    pub fn from_millis_f64(ms: f64) -> Self {
        if ms.is_nan() || ms == f64::INFINITY {
            return Timeout::Infinite;
        }
        if ms <= 0.0 {
            return Timeout::Bounded(Duration::ZERO);
        }
        Duration::try_from_secs_f64(ms / 1000.0)
            .map(Timeout::Bounded)
            .unwrap_or(Timeout::Infinite)
    }

    /// True when the wait should not park at all
    pub fn already_expired(&self) -> bool {
        matches!(self, Timeout::Bounded(d) if d.is_zero())
    }

    /// Absolute deadline measured from `now`; `None` for infinite waits
    pub fn deadline_from(&self, now: Instant) -> Option<Instant> {
        match self {
            Timeout::Infinite => None,
            Timeout::Bounded(d) => Some(now + *d),
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(d) => Timeout::Bounded(d),
            None => Timeout::Infinite,
        }
    }
}

/// How many waiters a notify call may wake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeCount {
    /// Wake every waiter queued at the key
    All,
    /// Wake at most this many
    Count(usize),
}

impl WakeCount {
    /// Number of waiters to actually dequeue given queue length
    pub(crate) fn limit(&self, available: usize) -> usize {
        match self {
            WakeCount::All => available,
            WakeCount::Count(n) => (*n).min(available),
        }
    }
}

impl From<usize> for WakeCount {
    fn from(n: usize) -> Self {
        WakeCount::Count(n)
    }
}

impl From<Option<usize>> for WakeCount {
    fn from(n: Option<usize>) -> Self {
        match n {
            Some(n) => WakeCount::Count(n),
            None => WakeCount::All,
        }
    }
}
