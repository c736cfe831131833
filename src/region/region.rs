/*!
 * Shared Region
 * Fixed-size byte buffer with sequentially-consistent atomic cell access
 */

use super::types::{CellValue, CellWidth, RegionError, RegionId, MAX_REGION_SIZE};
use log::debug;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

// Process-wide id allocation; ids are never reused
static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(1);

/// A fixed-size shared memory region
///
/// Multiple agents hold clones of the same handle; every clone refers to the
/// same cells and the same identity. All accesses are bounds- and
/// alignment-checked at the API boundary before any side effect occurs, and
/// every load/store/CAS is a single sequentially-consistent word operation,
/// so no partial write is ever observable.
#[derive(Clone)]
pub struct SharedRegion {
    inner: Arc<RegionInner>,
}

struct RegionInner {
    id: RegionId,
    len: usize,
    // Backing storage is 8-byte aligned words; the logical length in bytes
    // may be smaller than the allocation.
    cells: Box<[AtomicU64]>,
}

impl SharedRegion {
    /// Create a new zero-filled region of `len` bytes
    pub fn new(len: usize) -> Result<Self, RegionError> {
        if len == 0 {
            return Err(RegionError::InvalidSize("length cannot be zero".to_string()));
        }
        if len > MAX_REGION_SIZE {
            return Err(RegionError::InvalidSize(format!(
                "length {} exceeds maximum {}",
                len, MAX_REGION_SIZE
            )));
        }

        let words = len.div_ceil(8);
        let cells: Box<[AtomicU64]> = (0..words).map(|_| AtomicU64::new(0)).collect();
        let id = NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed);

        debug!("Created shared region {} ({} bytes)", id, len);

        Ok(Self {
            inner: Arc::new(RegionInner { id, len, cells }),
        })
    }

    /// Process-unique identity of this region
    pub fn id(&self) -> RegionId {
        self.inner.id
    }

    /// Logical length in bytes
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Always false: zero-length regions are rejected at construction.
    /// Kept so `len` carries its conventional companion.
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Validate that `offset` names an in-range, naturally-aligned cell
    pub fn validate_access(&self, offset: usize, width: CellWidth) -> Result<(), RegionError> {
        let bytes = width.bytes();
        if offset % bytes != 0 {
            return Err(RegionError::Misaligned {
                offset,
                align: bytes,
            });
        }
        // Overflow-safe: `offset + bytes` could wrap for offsets near
        // usize::MAX and let an out-of-bounds access through.
        if bytes > self.inner.len || offset > self.inner.len - bytes {
            return Err(RegionError::OutOfRange {
                offset,
                width: bytes,
                length: self.inner.len,
            });
        }
        Ok(())
    }

    /// Sequentially-consistent load of the cell at `offset`
    pub fn load(&self, offset: usize, width: CellWidth) -> Result<CellValue, RegionError> {
        self.validate_access(offset, width)?;
        let value = match width {
            CellWidth::U32 => CellValue::U32(unsafe { self.cell_u32(offset) }.load(Ordering::SeqCst)),
            CellWidth::U64 => CellValue::U64(unsafe { self.cell_u64(offset) }.load(Ordering::SeqCst)),
        };
        Ok(value)
    }

    /// Sequentially-consistent store to the cell at `offset`
    pub fn store(&self, offset: usize, value: CellValue) -> Result<(), RegionError> {
        self.validate_access(offset, value.width())?;
        match value {
            CellValue::U32(v) => unsafe { self.cell_u32(offset) }.store(v, Ordering::SeqCst),
            CellValue::U64(v) => unsafe { self.cell_u64(offset) }.store(v, Ordering::SeqCst),
        }
        Ok(())
    }

    pub fn load_u32(&self, offset: usize) -> Result<u32, RegionError> {
        self.validate_access(offset, CellWidth::U32)?;
        Ok(unsafe { self.cell_u32(offset) }.load(Ordering::SeqCst))
    }

    pub fn load_u64(&self, offset: usize) -> Result<u64, RegionError> {
        self.validate_access(offset, CellWidth::U64)?;
        Ok(unsafe { self.cell_u64(offset) }.load(Ordering::SeqCst))
    }

    pub fn store_u32(&self, offset: usize, value: u32) -> Result<(), RegionError> {
        self.validate_access(offset, CellWidth::U32)?;
        unsafe { self.cell_u32(offset) }.store(value, Ordering::SeqCst);
        Ok(())
    }

    pub fn store_u64(&self, offset: usize, value: u64) -> Result<(), RegionError> {
        self.validate_access(offset, CellWidth::U64)?;
        unsafe { self.cell_u64(offset) }.store(value, Ordering::SeqCst);
        Ok(())
    }

    /// Compare-and-swap; returns the value held before the operation
    pub fn compare_exchange_u32(
        &self,
        offset: usize,
        current: u32,
        new: u32,
    ) -> Result<u32, RegionError> {
        self.validate_access(offset, CellWidth::U32)?;
        let prior = match unsafe { self.cell_u32(offset) }.compare_exchange(
            current,
            new,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(prev) | Err(prev) => prev,
        };
        Ok(prior)
    }

    /// Compare-and-swap; returns the value held before the operation
    pub fn compare_exchange_u64(
        &self,
        offset: usize,
        current: u64,
        new: u64,
    ) -> Result<u64, RegionError> {
        self.validate_access(offset, CellWidth::U64)?;
        let prior = match unsafe { self.cell_u64(offset) }.compare_exchange(
            current,
            new,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(prev) | Err(prev) => prev,
        };
        Ok(prior)
    }

    /// Load for an already-validated access, zero-extended to 64 bits.
    ///
    /// Callers must have run `validate_access` for the same offset and width.
    pub(crate) fn load_cell(&self, offset: usize, width: CellWidth) -> u64 {
        debug_assert!(self.validate_access(offset, width).is_ok());
        match width {
            CellWidth::U32 => unsafe { self.cell_u32(offset) }.load(Ordering::SeqCst) as u64,
            CellWidth::U64 => unsafe { self.cell_u64(offset) }.load(Ordering::SeqCst),
        }
    }

    /// # Safety
    /// `offset` must be in range and 4-byte aligned (see `validate_access`).
    unsafe fn cell_u32(&self, offset: usize) -> &AtomicU32 {
        // Backing words are 8-byte aligned, so a validated offset lands on a
        // properly aligned, in-bounds AtomicU32.
        &*self
            .inner
            .cells
            .as_ptr()
            .cast::<u8>()
            .add(offset)
            .cast::<AtomicU32>()
    }

    /// # Safety
    /// `offset` must be in range and 8-byte aligned (see `validate_access`).
    unsafe fn cell_u64(&self, offset: usize) -> &AtomicU64 {
        &*self
            .inner
            .cells
            .as_ptr()
            .cast::<u8>()
            .add(offset)
            .cast::<AtomicU64>()
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("id", &self.inner.id)
            .field("len", &self.inner.len)
            .finish()
    }
}
