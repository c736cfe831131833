/*!
 * Wait Engine
 * Blocking wait: value check, park, resume on wake or timeout
 */

use super::table::WaiterTable;
use super::timer::TimerService;
use super::types::{Timeout, WaitKey, WaitOutcome};
use super::waiter::{WakeState, Waiter};
use crate::region::{CellValue, RegionError, SharedRegion};
use log::trace;
use std::sync::Arc;
use std::time::Instant;

/// Blocking wait on a shared region cell.
///
/// Parks the calling OS thread until a notify or the deadline, whichever
/// comes first. The value check and the enqueue happen under the key's queue
/// lock, so a store+notify landing between them cannot be missed.
#[derive(Clone)]
pub struct WaitEngine {
    table: WaiterTable,
    timers: Arc<TimerService>,
}

impl WaitEngine {
    pub fn new(table: WaiterTable, timers: Arc<TimerService>) -> Self {
        Self { table, timers }
    }

    /// Wait for the cell at `offset` to be notified while it holds `expected`.
    ///
    /// Returns `NotEqual` without parking when the value check fails, `Ok`
    /// when woken by notify, and `TimedOut` when the deadline fires first.
    /// Exactly one of `Ok`/`TimedOut` is ever observed per parked wait.
    pub fn wait(
        &self,
        region: &SharedRegion,
        offset: usize,
        expected: CellValue,
        timeout: Timeout,
    ) -> Result<WaitOutcome, RegionError> {
        let width = expected.width();
        region.validate_access(offset, width)?;

        let key = WaitKey::new(region.id(), offset);
        let deadline = timeout.deadline_from(Instant::now());

        // Zero (or normalized-negative) timeout: one immediate check, no parking.
        if timeout.already_expired() {
            return Ok(if region.load_cell(offset, width) == expected.bits() {
                WaitOutcome::TimedOut
            } else {
                WaitOutcome::NotEqual
            });
        }

        let waiter = Waiter::new_blocking(key, expected);
        let parked = self.table.park_if(key, Arc::clone(&waiter), || {
            region.load_cell(offset, width) == expected.bits()
        });
        if !parked {
            return Ok(WaitOutcome::NotEqual);
        }

        if let Some(deadline) = deadline {
            self.table.arm_timeout(&self.timers, key, &waiter, deadline);
        }

        waiter.block();

        // Whoever resumed us already dequeued the waiter under the key lock.
        let outcome = match waiter.state() {
            WakeState::Woken => WaitOutcome::Ok,
            _ => WaitOutcome::TimedOut,
        };
        trace!("Wait at {:?} resolved to {:?}", key, outcome);
        Ok(outcome)
    }
}
