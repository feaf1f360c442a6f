//! Locating launchd's bootstrap pipe in foreign global state
//!
//! libxpc connects to launchd once per process and parks the pipe in its
//! global data record, reachable through `_os_alloc_once_table`. This module
//! reads that record without ever initializing it, and refuses to hand out a
//! pipe when the record does not look like the layout we know.

pub mod layout;
pub mod table;

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::common::{Error, Result};

pub use layout::{BootstrapLayout, RECORD_SIZE};
pub use table::{AllocOnceTable, AllocSlot, NativeAllocTable};

/// `MACH_PORT_NULL`
const MACH_PORT_NULL: u32 = 0;
/// `MACH_PORT_DEAD`
const MACH_PORT_DEAD: u32 = u32::MAX;

/// Reference to the pipe libxpc already connected to launchd
///
/// Owned by the runtime, valid for the process lifetime. Only a
/// [`ForeignStateReader`] produces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeHandle {
    pipe: NonNull<c_void>,
    bootstrap_port: u32,
}

// The pipe object is runtime-owned and never freed; xpc_pipe_routine is
// safe to call from multiple threads.
unsafe impl Send for PipeHandle {}
unsafe impl Sync for PipeHandle {}

impl PipeHandle {
    pub(crate) fn new(pipe: NonNull<c_void>, bootstrap_port: u32) -> Self {
        Self {
            pipe,
            bootstrap_port,
        }
    }

    /// Raw `xpc_pipe_t`
    pub fn as_ptr(&self) -> *mut c_void {
        self.pipe.as_ptr()
    }

    /// The task bootstrap port found next to the pipe
    pub fn bootstrap_port(&self) -> u32 {
        self.bootstrap_port
    }
}

/// Resolves the daemon pipe from process state
pub trait ForeignStateReader {
    fn resolve_pipe(&self) -> Result<PipeHandle>;
}

/// Reads the pipe out of libxpc's slot in the allocation table
#[derive(Debug, Clone)]
pub struct GlobalStateLocator<T> {
    table: T,
    layout: BootstrapLayout,
}

impl GlobalStateLocator<NativeAllocTable> {
    /// Locator over this process's real table
    pub fn native(layout: BootstrapLayout) -> Result<Self> {
        Self::new(NativeAllocTable::locate()?, layout)
    }
}

impl<T: AllocOnceTable> GlobalStateLocator<T> {
    /// Fails with `LayoutMismatch` if `layout` would read outside the
    /// record or the table
    pub fn new(table: T, layout: BootstrapLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self { table, layout })
    }

    pub fn layout(&self) -> &BootstrapLayout {
        &self.layout
    }

    /// Read a field of the record at `offset`
    ///
    /// # Safety
    ///
    /// `base` must be readable for `offset + size_of::<F>()` bytes.
    unsafe fn read_field<F: Copy>(base: *const u8, offset: usize) -> F {
        base.add(offset).cast::<F>().read_unaligned()
    }
}

impl<T: AllocOnceTable> ForeignStateReader for GlobalStateLocator<T> {
    fn resolve_pipe(&self) -> Result<PipeHandle> {
        let index = self.layout.slot_index;
        let slot = self.table.read_slot(index)?;

        if !slot.is_initialized() {
            tracing::debug!(slot = index, once = slot.once, "XPC slot not initialized");
            return Err(Error::UninitializedState { slot: index });
        }
        if slot.ptr.is_null() {
            return Err(Error::layout_mismatch(format!(
                "slot {} initialized with a null record",
                index
            )));
        }

        let base = slot.ptr.cast::<u8>().cast_const();

        // Check the cheap invariant before reading anything else.
        // SAFETY: AllocOnceTable guarantees RECORD_SIZE readable bytes behind
        // an initialized, non-null slot, and `new` checked span() fits in it.
        let flags: u64 = unsafe { Self::read_field(base, self.layout.flags_offset) };
        if flags > self.layout.max_flags {
            return Err(Error::layout_mismatch(format!(
                "flags {:#x} above accepted maximum {:#x}",
                flags, self.layout.max_flags
            )));
        }

        let port: u32 = unsafe { Self::read_field(base, self.layout.port_offset) };
        if port == MACH_PORT_NULL || port == MACH_PORT_DEAD {
            return Err(Error::layout_mismatch(format!(
                "bootstrap port {:#x} is not a live right",
                port
            )));
        }

        let pipe: *mut c_void = unsafe { Self::read_field(base, self.layout.pipe_offset) };
        let pipe = NonNull::new(pipe)
            .ok_or_else(|| Error::layout_mismatch("bootstrap pipe pointer is null"))?;

        tracing::trace!(slot = index, flags, port, "resolved launchd bootstrap pipe");
        Ok(PipeHandle::new(pipe, port))
    }
}
