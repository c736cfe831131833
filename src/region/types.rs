/*!
 * Shared Region Types
 * Common types, constants, and errors for shared memory regions
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Region identifier, unique within a process
pub type RegionId = u64;

/// Upper bound on region length; a sanity cap, not a scheduling budget
pub const MAX_REGION_SIZE: usize = 1024 * 1024 * 1024; // 1GB

/// Access width of an atomic cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellWidth {
    U32,
    U64,
}

impl CellWidth {
    /// Width in bytes; doubles as the required alignment
    pub const fn bytes(self) -> usize {
        match self {
            CellWidth::U32 => 4,
            CellWidth::U64 => 8,
        }
    }
}

/// A value read from or compared against a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellValue {
    U32(u32),
    U64(u64),
}

impl CellValue {
    pub const fn width(self) -> CellWidth {
        match self {
            CellValue::U32(_) => CellWidth::U32,
            CellValue::U64(_) => CellWidth::U64,
        }
    }

    /// Bit pattern zero-extended to 64 bits, for width-independent comparison
    pub const fn bits(self) -> u64 {
        match self {
            CellValue::U32(v) => v as u64,
            CellValue::U64(v) => v,
        }
    }
}

impl From<u32> for CellValue {
    fn from(v: u32) -> Self {
        CellValue::U32(v)
    }
}

impl From<u64> for CellValue {
    fn from(v: u64) -> Self {
        CellValue::U64(v)
    }
}

/// Shared region error types
///
/// These are the usage errors of the subsystem: they surface synchronously,
/// before any side effect, and never enqueue a waiter.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum RegionError {
    /// Invalid region size
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Access extends past the end of the region
    #[error("Offset out of range: offset {offset}, access width {width}, region length {length}")]
    OutOfRange {
        offset: usize,
        width: usize,
        length: usize,
    },

    /// Offset not aligned to the cell's natural size
    #[error("Misaligned offset: {offset} is not a multiple of {align}")]
    Misaligned { offset: usize, align: usize },
}
