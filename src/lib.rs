/*!
 * memwait
 * Futex-style shared-memory wait/notify primitives for multi-agent runtimes
 */

pub mod region;
pub mod sync;

// Re-exports
pub use region::{CellValue, CellWidth, RegionError, RegionId, SharedRegion, MAX_REGION_SIZE};
pub use sync::{
    AsyncWaitEngine, NotifyEngine, SyncManager, TimerHandle, TimerService, Timeout,
    WaitAsyncResult, WaitEngine, WaitHandle, WaitKey, WaitOutcome, WaiterTable, WakeCount,
};
