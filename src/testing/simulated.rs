//! In-memory stand-in for `_os_alloc_once_table`

use std::ffi::c_void;

use crate::common::{Error, Result};
use crate::locator::table::{AllocOnceTable, AllocSlot, ONCE_DONE, TABLE_LEN};

/// libxpc's global data record with the LP64 layout
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SimulatedGlobalData {
    pub reserved: u64,
    pub flags: u64,
    pub port: u32,
    pub padding: u32,
    pub pipe: *mut c_void,
}

impl SimulatedGlobalData {
    pub const PORT: u32 = 0x1103;
    pub const PIPE: usize = 0x7f00_1000;

    /// A record every sanity check accepts
    pub fn valid() -> Self {
        Self {
            reserved: 0,
            flags: 0x3,
            port: Self::PORT,
            padding: 0,
            pipe: Self::PIPE as *mut c_void,
        }
    }
}

/// Table of `TABLE_LEN` slots where only libxpc's slot 1 may be populated
pub struct SimulatedTable {
    slots: Vec<AllocSlot>,
    // Keeps the record the slot points at alive and at a fixed address.
    _record: Option<Box<SimulatedGlobalData>>,
}

// Slots and record are never mutated after construction.
unsafe impl Send for SimulatedTable {}
unsafe impl Sync for SimulatedTable {}

impl SimulatedTable {
    const SLOT: usize = 1;

    fn with_slot(once: isize, record: Option<SimulatedGlobalData>) -> Self {
        let mut record = record.map(Box::new);
        let ptr: *mut c_void = record
            .as_deref_mut()
            .map_or(std::ptr::null_mut(), |r| (r as *mut SimulatedGlobalData).cast());
        let mut slots = vec![AllocSlot::EMPTY; TABLE_LEN];
        slots[Self::SLOT] = AllocSlot { once, ptr };
        Self {
            slots,
            _record: record,
        }
    }

    /// libxpc has finished initializing its slot
    pub fn initialized(record: SimulatedGlobalData) -> Self {
        Self::with_slot(ONCE_DONE, Some(record))
    }

    /// libxpc never touched its slot
    pub fn uninitialized() -> Self {
        Self::with_slot(0, None)
    }

    /// Another thread is mid-initialization
    pub fn in_progress(record: SimulatedGlobalData) -> Self {
        Self::with_slot(0x2303, Some(record))
    }

    /// Slot marked done but holding no record
    pub fn done_without_record() -> Self {
        Self::with_slot(ONCE_DONE, None)
    }
}

// SAFETY: an initialized non-null slot points at the boxed record, which is
// at least RECORD_SIZE bytes and lives as long as the table.
unsafe impl AllocOnceTable for SimulatedTable {
    fn read_slot(&self, index: usize) -> Result<AllocSlot> {
        self.slots.get(index).copied().ok_or_else(|| {
            Error::layout_mismatch(format!("slot index {} outside table of {}", index, TABLE_LEN))
        })
    }
}
