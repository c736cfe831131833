/*!
 * Waiter
 * One parked or pending wait operation, with a terminal wake state machine
 */

use super::timer::TimerHandle;
use super::types::{WaitKey, WaitOutcome};
use crate::region::CellValue;
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Wake state machine: `Waiting -> {Woken | TimedOut}`, terminal.
///
/// The transition is a single compare-and-swap, so the race between notify
/// and timeout is resolved exactly once by construction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeState {
    Waiting = 0,
    Woken = 1,
    TimedOut = 2,
}

impl WakeState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WakeState::Waiting,
            1 => WakeState::Woken,
            _ => WakeState::TimedOut,
        }
    }
}

/// Condvar pair a blocking waiter parks on
struct ThreadSignal {
    done: Mutex<bool>,
    condvar: Condvar,
}

impl ThreadSignal {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.condvar.wait(&mut done);
        }
    }

    fn notify(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.condvar.notify_one();
    }
}

/// How the winning transition delivers the outcome to the waiting agent
enum ResumeSlot {
    /// Unpark a blocked OS thread; it reads the outcome from the wake state
    Thread(ThreadSignal),
    /// Post the outcome onto the owning agent's scheduler, consumed once
    Task(Mutex<Option<oneshot::Sender<WaitOutcome>>>),
}

/// One parked or pending wait operation.
///
/// A waiter is present in its key's queue iff its state is `Waiting`;
/// removal and the state transition always happen in the same critical
/// section under the key's queue lock.
pub(crate) struct Waiter {
    key: WaitKey,
    expected: CellValue,
    state: AtomicU8,
    timer: Mutex<Option<TimerHandle>>,
    resume: ResumeSlot,
}

impl Waiter {
    pub(crate) fn new_blocking(key: WaitKey, expected: CellValue) -> Arc<Self> {
        Arc::new(Self {
            key,
            expected,
            state: AtomicU8::new(WakeState::Waiting as u8),
            timer: Mutex::new(None),
            resume: ResumeSlot::Thread(ThreadSignal::new()),
        })
    }

    pub(crate) fn new_async(key: WaitKey, expected: CellValue) -> (Arc<Self>, WaitHandle) {
        let (tx, rx) = oneshot::channel();
        let waiter = Arc::new(Self {
            key,
            expected,
            state: AtomicU8::new(WakeState::Waiting as u8),
            timer: Mutex::new(None),
            resume: ResumeSlot::Task(Mutex::new(Some(tx))),
        });
        (waiter, WaitHandle { rx })
    }

    pub(crate) fn key(&self) -> WaitKey {
        self.key
    }

    pub(crate) fn expected(&self) -> CellValue {
        self.expected
    }

    pub(crate) fn state(&self) -> WakeState {
        WakeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Claim the terminal transition. Returns true for exactly one caller.
    pub(crate) fn transition(&self, to: WakeState) -> bool {
        debug_assert_ne!(to, WakeState::Waiting);
        self.state
            .compare_exchange(
                WakeState::Waiting as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn set_timer(&self, handle: TimerHandle) {
        *self.timer.lock() = Some(handle);
    }

    pub(crate) fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.cancel();
        }
    }

    /// Deliver the outcome; only the transition winner may call this.
    pub(crate) fn resume(&self, outcome: WaitOutcome) {
        match &self.resume {
            ResumeSlot::Thread(signal) => signal.notify(),
            ResumeSlot::Task(sender) => {
                if let Some(tx) = sender.lock().take() {
                    // The handle may have been dropped; nothing to deliver then.
                    let _ = tx.send(outcome);
                }
            }
        }
    }

    /// Park the calling thread until the waiter leaves `Waiting`.
    /// No-op for async waiters.
    pub(crate) fn block(&self) {
        if let ResumeSlot::Thread(signal) = &self.resume {
            signal.wait();
        }
    }
}

/// Deferred completion handle for an asynchronous wait.
///
/// Resolves to the final [`WaitOutcome`] when the waiter is notified or
/// times out. Resolution is posted by the waking thread and observed on the
/// caller's own executor, never inside the call that triggered the wake.
pub struct WaitHandle {
    rx: oneshot::Receiver<WaitOutcome>,
}

impl Future for WaitHandle {
    type Output = WaitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the waiter table itself was torn down while
        // the wait was pending; report it as a timeout.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(WaitOutcome::TimedOut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn test_key() -> WaitKey {
        WaitKey::new(1, 0)
    }

    #[test]
    fn test_transition_is_exclusive() {
        let waiter = Waiter::new_blocking(test_key(), CellValue::U32(0));

        assert!(waiter.transition(WakeState::Woken));
        assert!(!waiter.transition(WakeState::TimedOut));
        assert_eq!(waiter.state(), WakeState::Woken);
    }

    #[test]
    fn test_transition_race_has_one_winner() {
        for _ in 0..100 {
            let waiter = Waiter::new_blocking(test_key(), CellValue::U32(0));
            let w1 = Arc::clone(&waiter);
            let w2 = Arc::clone(&waiter);

            let a = thread::spawn(move || w1.transition(WakeState::Woken));
            let b = thread::spawn(move || w2.transition(WakeState::TimedOut));

            let (a, b) = (a.join().unwrap(), b.join().unwrap());
            assert!(a ^ b, "exactly one racer must win");
        }
    }

    #[test]
    fn test_blocking_resume_unparks() {
        let waiter = Waiter::new_blocking(test_key(), CellValue::U32(0));
        let parked = Arc::clone(&waiter);

        let handle = thread::spawn(move || {
            parked.block();
            parked.state()
        });

        assert!(waiter.transition(WakeState::Woken));
        waiter.resume(WaitOutcome::Ok);

        assert_eq!(handle.join().unwrap(), WakeState::Woken);
    }

    #[tokio::test]
    async fn test_async_resume_delivers_once() {
        let (waiter, handle) = Waiter::new_async(test_key(), CellValue::U32(0));

        assert!(waiter.transition(WakeState::Woken));
        waiter.resume(WaitOutcome::Ok);
        // A second resume finds the sender already consumed
        waiter.resume(WaitOutcome::TimedOut);

        assert_eq!(handle.await, WaitOutcome::Ok);
    }
}
