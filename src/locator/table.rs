//! Access to the process-wide once-initialized allocation table
//!
//! libplatform keeps `_os_alloc_once_table`, an array of `{ once, ptr }`
//! pairs. Each runtime library owns one key and fills its slot exactly once.
//! We only ever read it.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicIsize, Ordering};

use crate::common::{Error, Result};

/// Entries in libplatform's table (`OS_ALLOC_ONCE_KEY_MAX`)
pub const TABLE_LEN: usize = 100;

/// Once-word value after initialization finished (`~0l`)
pub const ONCE_DONE: isize = !0;

/// One `_os_alloc_once_s` entry
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AllocSlot {
    pub once: isize,
    pub ptr: *mut c_void,
}

impl AllocSlot {
    /// Slot that was never touched
    pub const EMPTY: Self = Self {
        once: 0,
        ptr: std::ptr::null_mut(),
    };

    /// Whether the owning runtime has finished initializing this slot
    ///
    /// Zero means never started. Any other value besides `ONCE_DONE` is the
    /// in-progress marker of another thread.
    pub fn is_initialized(&self) -> bool {
        self.once == ONCE_DONE
    }
}

/// Source of allocation slots
///
/// # Safety
///
/// For any slot this returns with [`AllocSlot::is_initialized`] true and a
/// non-null pointer, the pointer must stay readable for at least
/// [`RECORD_SIZE`](super::layout::RECORD_SIZE) bytes for the rest of the
/// process lifetime.
pub unsafe trait AllocOnceTable {
    /// Snapshot one slot
    fn read_slot(&self, index: usize) -> Result<AllocSlot>;
}

/// The real table, found in the running process
#[derive(Debug, Clone, Copy)]
pub struct NativeAllocTable {
    base: NonNull<AllocSlot>,
}

// The table lives for the whole process and is only read here.
unsafe impl Send for NativeAllocTable {}
unsafe impl Sync for NativeAllocTable {}

impl NativeAllocTable {
    /// Look up `_os_alloc_once_table` in the loaded images
    #[cfg(target_os = "macos")]
    pub fn locate() -> Result<Self> {
        let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"_os_alloc_once_table".as_ptr()) };
        NonNull::new(sym.cast::<AllocSlot>())
            .map(|base| Self { base })
            .ok_or_else(|| {
                Error::UnsupportedPlatform("_os_alloc_once_table is not exported".to_string())
            })
    }

    #[cfg(not(target_os = "macos"))]
    pub fn locate() -> Result<Self> {
        Err(Error::UnsupportedPlatform(format!(
            "no launchd allocation table on {}",
            std::env::consts::OS
        )))
    }
}

unsafe impl AllocOnceTable for NativeAllocTable {
    fn read_slot(&self, index: usize) -> Result<AllocSlot> {
        if index >= TABLE_LEN {
            return Err(Error::layout_mismatch(format!(
                "slot index {} outside table of {}",
                index, TABLE_LEN
            )));
        }
        // SAFETY: index is in bounds of the exported table. The once word is
        // written by os_once on other threads, so load it atomically before
        // trusting the pointer next to it.
        unsafe {
            let slot = self.base.as_ptr().add(index);
            let once = AtomicIsize::from_ptr(std::ptr::addr_of_mut!((*slot).once))
                .load(Ordering::Acquire);
            let ptr = std::ptr::addr_of!((*slot).ptr).read();
            Ok(AllocSlot { once, ptr })
        }
    }
}
