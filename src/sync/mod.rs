/*!
 * Wait/Notify Subsystem
 *
 * Futex-style synchronization over shared region cells: agents block on, or
 * asynchronously await, the value at an aligned offset and are woken when
 * another agent stores a new value and notifies.
 *
 * # Architecture
 *
 * - `WaiterTable`: lock-striped registry of per-key FIFO queues
 * - `WaitEngine` / `AsyncWaitEngine`: blocking and deferred wait paths,
 *   sharing the same validation and check-then-park protocol
 * - `NotifyEngine`: FIFO wake of up to N waiters, pure queue operation
 * - `TimerService`: deadline expirations, racing notify exactly-once
 */

mod manager;
mod notify;
mod table;
mod timer;
mod types;
mod wait;
mod wait_async;
mod waiter;

pub use manager::SyncManager;
pub use notify::NotifyEngine;
pub use table::WaiterTable;
pub use timer::{TimerHandle, TimerService};
pub use types::{Timeout, WaitKey, WaitOutcome, WakeCount};
pub use wait::WaitEngine;
pub use wait_async::{AsyncWaitEngine, WaitAsyncResult};
pub use waiter::WaitHandle;
