/*!
 * Sync Manager
 * Aggregates the wait, async-wait, and notify engines over one waiter table
 */

use super::notify::NotifyEngine;
use super::table::WaiterTable;
use super::timer::TimerService;
use super::types::{Timeout, WaitKey, WaitOutcome, WakeCount};
use super::wait::WaitEngine;
use super::wait_async::{AsyncWaitEngine, WaitAsyncResult};
use crate::region::{CellValue, RegionError, SharedRegion};
use std::sync::Arc;

/// Convenience façade wiring the three engines to a shared waiter table and
/// timer service. Clones share state; the timer thread is joined when the
/// last clone drops.
#[derive(Clone)]
pub struct SyncManager {
    wait: WaitEngine,
    wait_async: AsyncWaitEngine,
    notify: NotifyEngine,
    table: WaiterTable,
}

impl SyncManager {
    pub fn new() -> Self {
        let table = WaiterTable::new();
        let timers = Arc::new(TimerService::new());
        Self {
            wait: WaitEngine::new(table.clone(), Arc::clone(&timers)),
            wait_async: AsyncWaitEngine::new(table.clone(), timers),
            notify: NotifyEngine::new(table.clone()),
            table,
        }
    }

    /// See [`WaitEngine::wait`]
    pub fn wait(
        &self,
        region: &SharedRegion,
        offset: usize,
        expected: CellValue,
        timeout: Timeout,
    ) -> Result<WaitOutcome, RegionError> {
        self.wait.wait(region, offset, expected, timeout)
    }

    /// See [`AsyncWaitEngine::wait_async`]
    pub fn wait_async(
        &self,
        region: &SharedRegion,
        offset: usize,
        expected: CellValue,
        timeout: Timeout,
    ) -> Result<WaitAsyncResult, RegionError> {
        self.wait_async.wait_async(region, offset, expected, timeout)
    }

    /// See [`NotifyEngine::notify`]
    pub fn notify(
        &self,
        region: &SharedRegion,
        offset: usize,
        count: WakeCount,
    ) -> Result<usize, RegionError> {
        self.notify.notify(region, offset, count)
    }

    /// Number of waiters currently parked at `(region, offset)`
    pub fn waiter_count(&self, region: &SharedRegion, offset: usize) -> usize {
        self.table.waiter_count(WaitKey::new(region.id(), offset))
    }
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new()
    }
}
