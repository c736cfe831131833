/*!
 * Timer Service
 * Deadline scheduling for bounded waits on a dedicated timer thread
 */

use log::info;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Cancellation token for one scheduled expiration.
///
/// Cancelling is advisory: a callback that already lost the wake race is a
/// no-op regardless, so a late cancel never causes a missed or double wake.
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

struct TimerEntry {
    deadline: Instant,
    // Insertion order breaks deadline ties so equal deadlines fire FIFO
    seq: u64,
    cancelled: Arc<AtomicBool>,
    on_timeout: Box<dyn FnOnce() + Send>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

struct TimerState {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerInner {
    state: Mutex<TimerState>,
    condvar: Condvar,
}

/// Schedules timeout expirations for both blocking and async waiters.
///
/// Infinite deadlines are never scheduled at all; the engines simply skip
/// this service. The callback for a bounded deadline claims its waiter under
/// the key's queue lock, so whichever of notify and timeout gets there first
/// wins and the loser's action is a no-op.
pub struct TimerService {
    inner: Arc<TimerInner>,
    thread: Option<JoinHandle<()>>,
}

impl TimerService {
    pub fn new() -> Self {
        let inner = Arc::new(TimerInner {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            condvar: Condvar::new(),
        });

        let worker = Arc::clone(&inner);
        let thread = thread::spawn(move || run(worker));

        info!("Timer service started");

        Self {
            inner,
            thread: Some(thread),
        }
    }

    /// Schedule `on_timeout` to run at `deadline`
    pub fn schedule(
        &self,
        deadline: Instant,
        on_timeout: impl FnOnce() + Send + 'static,
    ) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut state = self.inner.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(TimerEntry {
            deadline,
            seq,
            cancelled: Arc::clone(&cancelled),
            on_timeout: Box::new(on_timeout),
        }));
        drop(state);

        self.inner.condvar.notify_one();

        TimerHandle { cancelled }
    }

    /// Number of entries still queued (cancelled entries included until swept)
    pub fn pending(&self) -> usize {
        self.inner.state.lock().heap.len()
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.inner.state.lock().shutdown = true;
        self.inner.condvar.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn run(inner: Arc<TimerInner>) {
    let mut state = inner.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        // Sweep cancelled entries at the head so they don't delay real ones
        while state
            .heap
            .peek()
            .is_some_and(|Reverse(e)| e.cancelled.load(Ordering::Acquire))
        {
            state.heap.pop();
        }

        let next_deadline = state.heap.peek().map(|Reverse(e)| e.deadline);
        match next_deadline {
            Some(deadline) if deadline <= Instant::now() => {
                if let Some(Reverse(entry)) = state.heap.pop() {
                    // Run the callback without holding the timer lock; it
                    // takes the waiter's queue lock itself.
                    drop(state);
                    if !entry.cancelled.load(Ordering::Acquire) {
                        (entry.on_timeout)();
                    }
                    state = inner.state.lock();
                }
            }
            Some(deadline) => {
                inner.condvar.wait_until(&mut state, deadline);
            }
            None => {
                inner.condvar.wait(&mut state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_timer_fires_after_deadline() {
        let timers = TimerService::new();
        let (tx, rx) = mpsc::channel();

        let start = Instant::now();
        timers.schedule(start + Duration::from_millis(50), move || {
            tx.send(()).unwrap();
        });

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let timers = TimerService::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let handle = timers.schedule(Instant::now() + Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });
        handle.cancel();

        thread::sleep(Duration::from_millis(150));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let timers = TimerService::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();

        for (label, ms) in [("late", 80u64), ("early", 20), ("mid", 50)] {
            let order = Arc::clone(&order);
            timers.schedule(now + Duration::from_millis(ms), move || {
                order.lock().push(label);
            });
        }

        thread::sleep(Duration::from_millis(250));
        assert_eq!(*order.lock(), vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_drop_joins_cleanly_with_pending_entries() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let timers = TimerService::new();
            let counter = Arc::clone(&counter);
            timers.schedule(Instant::now() + Duration::from_secs(60), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(timers.pending(), 1);
        }
        // Service dropped before the deadline; entry must not fire
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
