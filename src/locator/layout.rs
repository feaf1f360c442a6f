//! Byte layout of libxpc's global data record
//!
//! ```text
//! struct xpc_global_data {
//!     uint64_t     a;
//!     uint64_t     xpc_flags;
//!     mach_port_t  task_bootstrap_port;
//!     uint32_t     padding;            // LP64 only
//!     xpc_object_t xpc_bootstrap_pipe;
//! };
//! ```
//!
//! None of this is API. Offsets are a contract with one range of OS
//! releases, so they live here as data instead of as a Rust struct.

use std::mem::{align_of, size_of};

use super::table::TABLE_LEN;
use crate::common::{Error, Result};

/// Size of `xpc_global_data`; tables promise this many readable bytes
pub const RECORD_SIZE: usize = if cfg!(target_pointer_width = "64") {
    32
} else {
    24
};

/// Offsets and sanity bounds used to interpret the foreign record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapLayout {
    /// Index into `_os_alloc_once_table` (libxpc's key)
    pub slot_index: usize,
    /// Offset of the flags word
    pub flags_offset: usize,
    /// Offset of the task bootstrap port (`mach_port_t`)
    pub port_offset: usize,
    /// Offset of the bootstrap pipe pointer
    pub pipe_offset: usize,
    /// Largest flags value still accepted as this layout
    pub max_flags: u64,
}

impl BootstrapLayout {
    /// 64-bit layout: port at 16, four bytes of padding, pipe at 24
    pub const LP64: Self = Self {
        slot_index: 1,
        flags_offset: 8,
        port_offset: 16,
        pipe_offset: 24,
        max_flags: 0xFFFF,
    };

    /// 32-bit layout: the pipe directly follows the port
    pub const ILP32: Self = Self {
        slot_index: 1,
        flags_offset: 8,
        port_offset: 16,
        pipe_offset: 20,
        max_flags: 0xFFFF,
    };

    /// Layout for the pointer width this crate was built for
    pub const fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::LP64
        } else {
            Self::ILP32
        }
    }

    /// Known layout for a macOS release, if any
    ///
    /// 10.10 through 15.x and 26.x share the same record. Releases after 26
    /// are unverified and fall back to the native layout.
    pub fn for_os_version(version: &os_info::Version) -> Option<Self> {
        match version {
            os_info::Version::Semantic(10, minor, _) if *minor >= 10 => Some(Self::native()),
            os_info::Version::Semantic(major, _, _)
                if (11..=15).contains(major) || *major == 26 =>
            {
                Some(Self::native())
            }
            _ => None,
        }
    }

    /// Pick the layout for the running host
    ///
    /// Unknown releases get the native layout; the sanity checks in the
    /// locator are what protect against a changed record.
    pub fn detect() -> Self {
        let info = os_info::get();
        if info.os_type() != os_info::Type::Macos {
            return Self::native();
        }
        match Self::for_os_version(info.version()) {
            Some(layout) => layout,
            None => {
                tracing::debug!(version = %info.version(), "no known XPC layout, using native");
                Self::native()
            }
        }
    }

    /// Number of bytes of the record this layout reads
    pub fn span(&self) -> usize {
        (self.flags_offset + size_of::<u64>())
            .max(self.port_offset + size_of::<u32>())
            .max(self.pipe_offset + size_of::<usize>())
    }

    /// Check that every read stays inside the record and the table
    ///
    /// Offsets must be aligned for their field and `span()` must fit in
    /// [`RECORD_SIZE`]; otherwise resolving would read memory that is not
    /// part of the record.
    pub fn validate(&self) -> Result<()> {
        if self.slot_index >= TABLE_LEN {
            return Err(Error::layout_mismatch(format!(
                "slot index {} outside table of {}",
                self.slot_index, TABLE_LEN
            )));
        }
        let fields = [
            ("flags", self.flags_offset, align_of::<u64>()),
            ("port", self.port_offset, align_of::<u32>()),
            ("pipe", self.pipe_offset, align_of::<usize>()),
        ];
        for (name, offset, align) in fields {
            if offset % align != 0 {
                return Err(Error::layout_mismatch(format!(
                    "{} offset {} is not {}-byte aligned",
                    name, offset, align
                )));
            }
        }
        if self.span() > RECORD_SIZE {
            return Err(Error::layout_mismatch(format!(
                "layout reads {} bytes of a {} byte record",
                self.span(),
                RECORD_SIZE
            )));
        }
        Ok(())
    }
}

impl Default for BootstrapLayout {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use os_info::Version;

    #[test]
    fn test_known_versions() {
        assert_eq!(
            BootstrapLayout::for_os_version(&Version::Semantic(10, 15, 7)),
            Some(BootstrapLayout::native())
        );
        assert_eq!(
            BootstrapLayout::for_os_version(&Version::Semantic(14, 2, 0)),
            Some(BootstrapLayout::native())
        );
        assert_eq!(
            BootstrapLayout::for_os_version(&Version::Semantic(26, 0, 1)),
            Some(BootstrapLayout::native())
        );
    }

    #[test]
    fn test_unknown_versions() {
        assert_eq!(BootstrapLayout::for_os_version(&Version::Semantic(10, 9, 5)), None);
        assert_eq!(BootstrapLayout::for_os_version(&Version::Semantic(27, 0, 0)), None);
        assert_eq!(BootstrapLayout::for_os_version(&Version::Unknown), None);
    }

    #[test]
    fn test_lp64_span_covers_pipe() {
        assert_eq!(BootstrapLayout::LP64.span(), 24 + size_of::<usize>());
    }

    #[test]
    fn test_native_layout_validates() {
        assert!(BootstrapLayout::native().validate().is_ok());
        assert!(BootstrapLayout::native().span() <= RECORD_SIZE);
    }

    #[test]
    fn test_offset_past_record_rejected() {
        let mut layout = BootstrapLayout::native();
        layout.pipe_offset = 64;
        assert!(matches!(layout.validate(), Err(Error::LayoutMismatch(_))));
    }

    #[test]
    fn test_misaligned_offset_rejected() {
        let mut layout = BootstrapLayout::native();
        layout.port_offset = 17;
        assert!(matches!(layout.validate(), Err(Error::LayoutMismatch(_))));
    }

    #[test]
    fn test_slot_outside_table_rejected() {
        let mut layout = BootstrapLayout::native();
        layout.slot_index = TABLE_LEN;
        assert!(matches!(layout.validate(), Err(Error::LayoutMismatch(_))));
    }

    #[test]
    fn test_detect_uses_slot_one() {
        assert_eq!(BootstrapLayout::detect().slot_index, 1);
    }
}
