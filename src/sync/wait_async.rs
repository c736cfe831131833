/*!
 * Async Wait Engine
 * Non-blocking wait: registers a deferred completion instead of parking
 */

use super::table::WaiterTable;
use super::timer::TimerService;
use super::types::{Timeout, WaitKey, WaitOutcome};
use super::waiter::{WaitHandle, Waiter};
use crate::region::{CellValue, RegionError, SharedRegion};
use log::trace;
use std::sync::Arc;
use std::time::Instant;

/// Result of a non-blocking wait
pub enum WaitAsyncResult {
    /// Resolved synchronously inside the call; no waiter was enqueued for
    /// `NotEqual`, and a zero timeout resolves to `TimedOut` without parking
    Ready(WaitOutcome),
    /// A waiter was enqueued; the handle resolves on a later turn
    Pending(WaitHandle),
}

impl WaitAsyncResult {
    /// True when the caller received a pending handle
    pub fn is_async(&self) -> bool {
        matches!(self, WaitAsyncResult::Pending(_))
    }
}

/// Non-blocking wait on a shared region cell.
///
/// Validation and the atomic value check mirror [`super::WaitEngine`]
/// exactly; the difference is that a matching value registers a deferred
/// completion and returns immediately instead of parking the agent. The
/// handle is fulfilled by notify or timeout via a message posted to the
/// caller's scheduler, never synchronously inside the waking call.
#[derive(Clone)]
pub struct AsyncWaitEngine {
    table: WaiterTable,
    timers: Arc<TimerService>,
}

impl AsyncWaitEngine {
    pub fn new(table: WaiterTable, timers: Arc<TimerService>) -> Self {
        Self { table, timers }
    }

    pub fn wait_async(
        &self,
        region: &SharedRegion,
        offset: usize,
        expected: CellValue,
        timeout: Timeout,
    ) -> Result<WaitAsyncResult, RegionError> {
        let width = expected.width();
        region.validate_access(offset, width)?;

        let key = WaitKey::new(region.id(), offset);
        let deadline = timeout.deadline_from(Instant::now());

        // An already-expired timeout never registers a completion: the
        // outcome is known now, so it is reported synchronously.
        if timeout.already_expired() {
            return Ok(WaitAsyncResult::Ready(
                if region.load_cell(offset, width) == expected.bits() {
                    WaitOutcome::TimedOut
                } else {
                    WaitOutcome::NotEqual
                },
            ));
        }

        let (waiter, handle) = Waiter::new_async(key, expected);
        let parked = self.table.park_if(key, Arc::clone(&waiter), || {
            region.load_cell(offset, width) == expected.bits()
        });
        if !parked {
            return Ok(WaitAsyncResult::Ready(WaitOutcome::NotEqual));
        }

        if let Some(deadline) = deadline {
            self.table.arm_timeout(&self.timers, key, &waiter, deadline);
        }

        trace!("Registered async wait at {:?}", key);
        Ok(WaitAsyncResult::Pending(handle))
    }
}
