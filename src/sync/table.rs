/*!
 * Waiter Table
 * Registry mapping wait keys to FIFO queues of parked waiters
 */

use super::timer::TimerService;
use super::types::{WaitKey, WaitOutcome, WakeCount};
use super::waiter::{WakeState, Waiter};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info, trace};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

type WaitQueue = VecDeque<Arc<Waiter>>;

/// Registry of per-key FIFO wait queues.
///
/// The map is lock-striped (dashmap shards), so contention is scoped to
/// keys, never to the table as a whole. A queue is created lazily on first
/// park and removed once empty. Every queue mutation, and the wake-state
/// transition of any waiter it holds, happens under that key's lock.
///
/// Constructible: independent tables never contend, so separate subsystems
/// can each own one rather than sharing a process singleton.
pub struct WaiterTable {
    queues: Arc<DashMap<WaitKey, WaitQueue, RandomState>>,
}

impl WaiterTable {
    pub fn new() -> Self {
        info!("Waiter table initialized");
        Self {
            queues: Arc::new(DashMap::with_hasher(RandomState::new())),
        }
    }

    /// Number of waiters currently parked at `key` (diagnostics)
    pub fn waiter_count(&self, key: WaitKey) -> usize {
        self.queues.get(&key).map(|q| q.len()).unwrap_or(0)
    }

    /// Number of keys with a live queue (diagnostics)
    pub fn key_count(&self) -> usize {
        self.queues.len()
    }

    /// Run `check` and, if it holds, enqueue `waiter` at the tail — both
    /// under the key's lock, so a store+notify between the value check and
    /// the enqueue cannot be missed. Returns whether the waiter was parked.
    pub(crate) fn park_if(
        &self,
        key: WaitKey,
        waiter: Arc<Waiter>,
        check: impl FnOnce() -> bool,
    ) -> bool {
        let mut queue = self.queues.entry(key).or_default();
        if !check() {
            let empty = queue.is_empty();
            drop(queue);
            if empty {
                self.queues.remove_if(&key, |_, q| q.is_empty());
            }
            return false;
        }

        trace!("Parked waiter at {:?} expecting {:?}", key, waiter.expected());
        queue.push_back(waiter);
        true
    }

    /// Dequeue up to `count` waiters from the head and claim each one's
    /// `Woken` transition. Resume actions are the caller's job and must run
    /// after this returns, outside the key's lock.
    pub(crate) fn wake_up_to(&self, key: WaitKey, count: WakeCount) -> Vec<Arc<Waiter>> {
        let Some(mut queue) = self.queues.get_mut(&key) else {
            return Vec::new();
        };

        let limit = count.limit(queue.len());
        let mut woken = Vec::with_capacity(limit);
        while woken.len() < limit {
            let Some(waiter) = queue.pop_front() else {
                break;
            };
            if waiter.transition(WakeState::Woken) {
                waiter.cancel_timer();
                woken.push(waiter);
            }
        }

        let empty = queue.is_empty();
        drop(queue);
        if empty {
            self.queues.remove_if(&key, |_, q| q.is_empty());
        }

        woken
    }

    /// Claim the `TimedOut` transition for `waiter` and unlink it, in one
    /// critical section. Returns false when notify already claimed it.
    pub(crate) fn expire(&self, key: WaitKey, waiter: &Arc<Waiter>) -> bool {
        let Some(mut queue) = self.queues.get_mut(&key) else {
            return false;
        };

        let claimed = match queue.iter().position(|w| Arc::ptr_eq(w, waiter)) {
            Some(pos) => {
                // Present in the queue implies still Waiting; the removal and
                // the transition share this critical section.
                let claimed = waiter.transition(WakeState::TimedOut);
                if claimed {
                    queue.remove(pos);
                }
                claimed
            }
            None => false,
        };

        let empty = queue.is_empty();
        drop(queue);
        if empty {
            self.queues.remove_if(&key, |_, q| q.is_empty());
        }

        claimed
    }

    /// Arm a timeout for a parked waiter. The fired callback claims the
    /// waiter under the key's lock and delivers `TimedOut`; a waiter already
    /// woken makes it a no-op.
    pub(crate) fn arm_timeout(
        &self,
        timers: &TimerService,
        key: WaitKey,
        waiter: &Arc<Waiter>,
        deadline: Instant,
    ) {
        let table = self.clone();
        let target = Arc::clone(waiter);
        let handle = timers.schedule(deadline, move || {
            if table.expire(key, &target) {
                debug!("Wait at {:?} timed out", target.key());
                target.resume(WaitOutcome::TimedOut);
            }
        });
        waiter.set_timer(handle);

        // The waiter may have been claimed between enqueue and arming; its
        // wake path found no handle to cancel, so the entry would otherwise
        // sit in the heap until the deadline. Expiry already no-ops either
        // way; this only releases the entry early.
        if waiter.state() != WakeState::Waiting {
            waiter.cancel_timer();
        }
    }
}

impl Default for WaiterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for WaiterTable {
    fn clone(&self) -> Self {
        Self {
            queues: Arc::clone(&self.queues),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::CellValue;
    use std::thread;
    use std::time::Duration;

    fn key() -> WaitKey {
        WaitKey::new(7, 0)
    }

    fn parked_waiter(table: &WaiterTable, key: WaitKey) -> Arc<Waiter> {
        let waiter = Waiter::new_blocking(key, CellValue::U32(0));
        assert!(table.park_if(key, Arc::clone(&waiter), || true));
        waiter
    }

    #[test]
    fn test_failed_check_never_enqueues() {
        let table = WaiterTable::new();
        let waiter = Waiter::new_blocking(key(), CellValue::U32(0));

        assert!(!table.park_if(key(), waiter, || false));
        assert_eq!(table.waiter_count(key()), 0);
        assert_eq!(table.key_count(), 0);
    }

    #[test]
    fn test_wake_is_fifo() {
        let table = WaiterTable::new();
        let first = parked_waiter(&table, key());
        let second = parked_waiter(&table, key());

        let woken = table.wake_up_to(key(), WakeCount::Count(1));
        assert_eq!(woken.len(), 1);
        assert!(Arc::ptr_eq(&woken[0], &first));
        assert_eq!(table.waiter_count(key()), 1);

        let woken = table.wake_up_to(key(), WakeCount::All);
        assert_eq!(woken.len(), 1);
        assert!(Arc::ptr_eq(&woken[0], &second));
        // Emptied queues are removed
        assert_eq!(table.key_count(), 0);
    }

    #[test]
    fn test_wake_on_unknown_key_is_empty() {
        let table = WaiterTable::new();
        assert!(table.wake_up_to(key(), WakeCount::All).is_empty());
    }

    #[test]
    fn test_expire_removes_exactly_once() {
        let table = WaiterTable::new();
        let waiter = parked_waiter(&table, key());

        assert!(table.expire(key(), &waiter));
        assert_eq!(table.waiter_count(key()), 0);
        // Already claimed and unlinked
        assert!(!table.expire(key(), &waiter));
    }

    #[test]
    fn test_expire_loses_to_wake() {
        let table = WaiterTable::new();
        let waiter = parked_waiter(&table, key());

        assert_eq!(table.wake_up_to(key(), WakeCount::All).len(), 1);
        assert!(!table.expire(key(), &waiter));
    }

    #[test]
    fn test_arming_after_wake_cancels_the_entry() {
        let table = WaiterTable::new();
        let timers = TimerService::new();
        let waiter = parked_waiter(&table, key());

        // The waiter is claimed before its timer gets armed
        assert_eq!(table.wake_up_to(key(), WakeCount::All).len(), 1);
        table.arm_timeout(
            &timers,
            key(),
            &waiter,
            Instant::now() + Duration::from_secs(60),
        );

        // Nudge the timer thread so it sweeps the cancelled head entry
        // instead of sleeping until the stale 60s deadline
        timers.schedule(Instant::now() + Duration::from_millis(10), || {});
        let deadline = Instant::now() + Duration::from_secs(5);
        while timers.pending() != 0 {
            assert!(Instant::now() < deadline, "cancelled entry was not swept");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let table = WaiterTable::new();
        let other = WaitKey::new(7, 8);
        let _w1 = parked_waiter(&table, key());
        let _w2 = parked_waiter(&table, other);

        assert!(table.wake_up_to(key(), WakeCount::All).len() == 1);
        assert_eq!(table.waiter_count(other), 1);
    }
}
