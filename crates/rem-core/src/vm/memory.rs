//! Machine Memory Regions
//!
//! Defines the two region flavors of the Register Execution Machine: raw
//! 32-bit word arrays and tagged-value arrays. Regions are fixed-capacity
//! and bounds-checked on every access; out-of-range addresses are fatal.

use std::rc::Rc;

use crate::error::{RemError, RemResult};

use super::value::{RegionId, Value};

/// Fixed-capacity array of raw 32-bit words
#[derive(Debug)]
pub struct WordRegion {
    id: RegionId,
    cells: Vec<u32>,
}

impl WordRegion {
    pub fn new(id: RegionId, capacity: usize) -> Self {
        WordRegion {
            id,
            cells: vec![0; capacity],
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn read(&self, addr: u32) -> RemResult<u32> {
        self.cells
            .get(addr as usize)
            .copied()
            .ok_or(RemError::OutOfBoundsAccess {
                region: self.id,
                addr,
            })
    }

    pub fn write(&mut self, addr: u32, word: u32) -> RemResult<()> {
        match self.cells.get_mut(addr as usize) {
            Some(cell) => {
                *cell = word;
                Ok(())
            }
            None => Err(RemError::OutOfBoundsAccess {
                region: self.id,
                addr,
            }),
        }
    }

    /// Reset every cell to zero
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

/// Fixed-capacity array of tagged value cells
pub struct ValueRegion {
    id: RegionId,
    cells: Vec<Rc<Value>>,
}

impl ValueRegion {
    pub fn new(id: RegionId, capacity: usize) -> Self {
        ValueRegion {
            id,
            cells: vec![Rc::new(Value::Null); capacity],
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Read the cell at `addr`; the returned handle shares identity with
    /// the stored cell.
    pub fn read(&self, addr: u32) -> RemResult<Rc<Value>> {
        self.cells
            .get(addr as usize)
            .cloned()
            .ok_or(RemError::OutOfBoundsAccess {
                region: self.id,
                addr,
            })
    }

    pub fn write(&mut self, addr: u32, value: Rc<Value>) -> RemResult<()> {
        match self.cells.get_mut(addr as usize) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(RemError::OutOfBoundsAccess {
                region: self.id,
                addr,
            }),
        }
    }

    /// Reset every cell to null
    pub fn clear(&mut self) {
        let null = Rc::new(Value::Null);
        self.cells.fill(null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_region_bounds_are_fatal() {
        let mut words = WordRegion::new(RegionId::Main, 4);
        words.write(3, 0xDEAD_BEEF).unwrap();
        assert_eq!(words.read(3).unwrap(), 0xDEAD_BEEF);
        assert!(words.read(4).is_err());
        assert!(words.write(4, 0).is_err());
        // pointer-offset wraparound lands far out of range
        assert!(words.read(u32::MAX).is_err());
    }

    #[test]
    fn clear_resets_cells() {
        let mut words = WordRegion::new(RegionId::Irs, 2);
        words.write(0, 7).unwrap();
        words.clear();
        assert_eq!(words.read(0).unwrap(), 0);

        let mut values = ValueRegion::new(RegionId::Stack, 2);
        values.write(1, Rc::new(Value::Int(3))).unwrap();
        values.clear();
        assert_eq!(*values.read(1).unwrap(), Value::Null);
    }

    #[test]
    fn value_region_reads_share_identity() {
        let mut values = ValueRegion::new(RegionId::Stack, 2);
        let cell = Rc::new(Value::Int(5));
        values.write(0, cell.clone()).unwrap();
        assert!(Rc::ptr_eq(&values.read(0).unwrap(), &cell));
    }
}
