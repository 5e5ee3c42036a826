//! Growable word-addressed memory.
//!
//! Memory is a flat array of `i64` cells addressed from 0. Any access past
//! the current end, read or write, extends the backing store with zero cells
//! up to and including the addressed cell. Negative addresses fault.

use crate::interpreter::fault::Fault;

/// Default growth ceiling: 16M cells (128 MiB).
pub const DEFAULT_MAX_CELLS: usize = 1 << 24;

/// Engine memory.
///
/// Owned by exactly one engine. Cloning produces an independent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
    limit: usize,
}

impl Memory {
    /// Create memory holding `image` followed by `extra_cells` zero cells.
    pub fn new(image: &[i64], extra_cells: usize) -> Self {
        Self::with_limit(image, extra_cells, DEFAULT_MAX_CELLS)
    }

    /// Like [`Memory::new`] with an explicit growth ceiling.
    ///
    /// The ceiling never drops below the initial size.
    pub fn with_limit(image: &[i64], extra_cells: usize, limit: usize) -> Self {
        let len = image.len() + extra_cells;
        let mut cells = Vec::with_capacity(len);
        cells.extend_from_slice(image);
        cells.resize(len, 0);

        Self {
            limit: limit.max(len),
            cells,
        }
    }

    /// Read the cell at `addr`, growing memory if needed.
    pub fn read(&mut self, addr: i64) -> Result<i64, Fault> {
        let idx = self.index(addr)?;
        self.ensure(idx);
        Ok(self.cells[idx])
    }

    /// Write `value` to the cell at `addr`, growing memory if needed.
    pub fn write(&mut self, addr: i64, value: i64) -> Result<(), Fault> {
        let idx = self.index(addr)?;
        self.ensure(idx);
        self.cells[idx] = value;
        Ok(())
    }

    /// Current number of materialized cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if no cell has been materialized.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Growth ceiling in cells.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// View of all materialized cells.
    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    /// Owned copy of all materialized cells.
    pub fn snapshot(&self) -> Vec<i64> {
        self.cells.clone()
    }

    fn index(&self, addr: i64) -> Result<usize, Fault> {
        let idx = usize::try_from(addr).map_err(|_| Fault::AddressError { addr })?;
        if idx >= self.limit {
            return Err(Fault::MemoryLimitExceeded {
                addr,
                limit: self.limit,
            });
        }
        Ok(idx)
    }

    #[inline]
    fn ensure(&mut self, idx: usize) {
        if idx >= self.cells.len() {
            self.cells.resize(idx + 1, 0);
        }
    }
}
