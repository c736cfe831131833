/*!
 * Notify Engine
 * FIFO wake of up to N waiters queued at one wait key
 */

use super::table::WaiterTable;
use super::types::{WaitKey, WaitOutcome, WakeCount};
use crate::region::{CellWidth, RegionError, SharedRegion};
use log::debug;

/// Wakes waiters parked at a wait key, earliest-parked first.
///
/// Purely a queue operation: the region value is never read or written.
/// Callers change the value with `store` first and then notify, by
/// convention.
#[derive(Clone)]
pub struct NotifyEngine {
    table: WaiterTable,
}

impl NotifyEngine {
    pub fn new(table: WaiterTable) -> Self {
        Self { table }
    }

    /// Wake up to `count` waiters at `(region, offset)`; returns the number
    /// actually woken. An unknown or empty key wakes zero, without error.
    pub fn notify(
        &self,
        region: &SharedRegion,
        offset: usize,
        count: WakeCount,
    ) -> Result<usize, RegionError> {
        // Word alignment suffices here: an 8-aligned 64-bit wait key is also
        // 4-aligned, and notify itself never touches the cell.
        region.validate_access(offset, CellWidth::U32)?;

        let key = WaitKey::new(region.id(), offset);
        let woken = self.table.wake_up_to(key, count);

        // Resume outside the key's lock: unparking threads and posting
        // completions must not run inside the queue's critical section.
        for waiter in &woken {
            waiter.resume(WaitOutcome::Ok);
        }

        if !woken.is_empty() {
            debug!("Woke {} waiter(s) at {:?}", woken.len(), key);
        }
        Ok(woken.len())
    }
}
