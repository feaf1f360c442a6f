//! XPC pipe transport
//!
//! `xpc_pipe_routine` is private and weakly imported, so it is looked up at
//! runtime instead of linked. Everything else comes from libxpc's public
//! object API through libSystem.

pub use imp::XpcPipeTransport;

#[cfg(target_os = "macos")]
mod imp {
    use std::ffi::{c_char, c_int, c_void, CStr, CString};
    use std::ptr::{self, NonNull};

    use crate::common::{Error, Result};
    use crate::ipc::info;
    use crate::ipc::protocol::{
        QueryMessage, QueryReply, XpcDictionary, XpcValue, KEY_BYTES_WRITTEN, KEY_ERROR,
        KEY_SHMEM,
    };
    use crate::ipc::transport::Transport;
    use crate::locator::PipeHandle;

    type XpcObject = *mut c_void;
    type XpcType = *const c_void;

    type PipeRoutine =
        unsafe extern "C" fn(pipe: *mut c_void, message: XpcObject, reply: *mut XpcObject) -> c_int;

    #[link(name = "System", kind = "dylib")]
    extern "C" {
        fn xpc_dictionary_create(
            keys: *const *const c_char,
            values: *const XpcObject,
            count: usize,
        ) -> XpcObject;
        fn xpc_dictionary_set_value(dict: XpcObject, key: *const c_char, value: XpcObject);
        fn xpc_dictionary_get_value(dict: XpcObject, key: *const c_char) -> XpcObject;
        fn xpc_array_create(objects: *const XpcObject, count: usize) -> XpcObject;
        fn xpc_array_append_value(array: XpcObject, value: XpcObject);
        fn xpc_bool_create(value: bool) -> XpcObject;
        fn xpc_int64_create(value: i64) -> XpcObject;
        fn xpc_uint64_create(value: u64) -> XpcObject;
        fn xpc_string_create(string: *const c_char) -> XpcObject;
        fn xpc_data_create(bytes: *const c_void, length: usize) -> XpcObject;
        fn xpc_shmem_create(region: *mut c_void, length: usize) -> XpcObject;
        fn xpc_get_type(object: XpcObject) -> XpcType;
        fn xpc_bool_get_value(object: XpcObject) -> bool;
        fn xpc_int64_get_value(object: XpcObject) -> i64;
        fn xpc_uint64_get_value(object: XpcObject) -> u64;
        fn xpc_string_get_string_ptr(object: XpcObject) -> *const c_char;
        fn xpc_release(object: XpcObject);

        static _xpc_type_bool: u8;
        static _xpc_type_int64: u8;
        static _xpc_type_uint64: u8;
        static _xpc_type_string: u8;
        static _xpc_type_dictionary: u8;
    }

    /// Status reported when launchd answers with something other than a dictionary
    const MALFORMED_REPLY_STATUS: i64 = -1;

    /// Owned reference to an XPC object, released on drop
    struct OwnedXpc(NonNull<c_void>);

    impl OwnedXpc {
        fn from_raw(object: XpcObject) -> Result<Self> {
            NonNull::new(object)
                .map(Self)
                .ok_or_else(|| Error::Internal("libxpc returned a null object".to_string()))
        }

        fn as_raw(&self) -> XpcObject {
            self.0.as_ptr()
        }

        fn is_dictionary(&self) -> bool {
            unsafe { xpc_get_type(self.as_raw()) == ptr::addr_of!(_xpc_type_dictionary).cast() }
        }

        fn from_value(value: &XpcValue) -> Result<Self> {
            let raw = unsafe {
                match value {
                    XpcValue::Bool(b) => xpc_bool_create(*b),
                    XpcValue::Int64(v) => xpc_int64_create(*v),
                    XpcValue::Uint64(v) => xpc_uint64_create(*v),
                    XpcValue::String(s) => xpc_string_create(c_string(s)?.as_ptr()),
                    XpcValue::Data(bytes) => xpc_data_create(bytes.as_ptr().cast(), bytes.len()),
                    XpcValue::Array(items) => {
                        let array = Self::from_raw(xpc_array_create(ptr::null(), 0))?;
                        for item in items {
                            xpc_array_append_value(array.as_raw(), Self::from_value(item)?.as_raw());
                        }
                        return Ok(array);
                    }
                    XpcValue::Dictionary(fields) => return Self::dictionary(fields),
                }
            };
            Self::from_raw(raw)
        }

        fn dictionary(fields: &XpcDictionary) -> Result<Self> {
            let dict = Self::from_raw(unsafe { xpc_dictionary_create(ptr::null(), ptr::null(), 0) })?;
            for (key, value) in fields {
                dict.set(&c_string(key)?, &Self::from_value(value)?);
            }
            Ok(dict)
        }

        /// Store `value` under `key`; the dictionary retains its own reference
        fn set(&self, key: &CStr, value: &OwnedXpc) {
            unsafe { xpc_dictionary_set_value(self.as_raw(), key.as_ptr(), value.as_raw()) }
        }

        /// Borrow a field of a dictionary as a plain value
        fn get(&self, key: &str) -> Option<XpcValue> {
            let key = CString::new(key).ok()?;
            unsafe {
                let object = xpc_dictionary_get_value(self.as_raw(), key.as_ptr());
                if object.is_null() {
                    return None;
                }
                let kind = xpc_get_type(object);
                if kind == ptr::addr_of!(_xpc_type_int64).cast() {
                    Some(XpcValue::Int64(xpc_int64_get_value(object)))
                } else if kind == ptr::addr_of!(_xpc_type_uint64).cast() {
                    Some(XpcValue::Uint64(xpc_uint64_get_value(object)))
                } else if kind == ptr::addr_of!(_xpc_type_bool).cast() {
                    Some(XpcValue::Bool(xpc_bool_get_value(object)))
                } else if kind == ptr::addr_of!(_xpc_type_string).cast() {
                    let s = xpc_string_get_string_ptr(object);
                    (!s.is_null()).then(|| {
                        XpcValue::String(CStr::from_ptr(s).to_string_lossy().into_owned())
                    })
                } else {
                    None
                }
            }
        }
    }

    impl Drop for OwnedXpc {
        fn drop(&mut self) {
            unsafe { xpc_release(self.as_raw()) }
        }
    }

    fn c_string(s: &str) -> Result<CString> {
        CString::new(s).map_err(|_| Error::Internal(format!("interior NUL in XPC string {:?}", s)))
    }

    /// Anonymous shared mapping launchd writes its dump into
    struct SharedRegion {
        addr: NonNull<c_void>,
        len: usize,
    }

    impl SharedRegion {
        fn allocate(len: usize) -> Result<Self> {
            let addr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_ANON | libc::MAP_SHARED,
                    -1,
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(std::io::Error::last_os_error().into());
            }
            NonNull::new(addr)
                .map(|addr| Self { addr, len })
                .ok_or_else(|| Error::Internal("mmap returned null".to_string()))
        }

        /// First `written` bytes as text, clamped to the mapping
        fn read_text(&self, written: usize) -> String {
            let n = written.min(self.len);
            let bytes = unsafe { std::slice::from_raw_parts(self.addr.as_ptr().cast::<u8>(), n) };
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    impl Drop for SharedRegion {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.addr.as_ptr(), self.len);
            }
        }
    }

    /// Transport over `xpc_pipe_routine`
    #[derive(Debug, Clone, Copy)]
    pub struct XpcPipeTransport {
        routine: Option<PipeRoutine>,
    }

    impl XpcPipeTransport {
        /// Look up `xpc_pipe_routine` in the loaded images
        pub fn detect() -> Self {
            let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"xpc_pipe_routine".as_ptr()) };
            let routine = (!sym.is_null())
                .then(|| unsafe { std::mem::transmute::<*mut c_void, PipeRoutine>(sym) });
            if routine.is_none() {
                tracing::debug!("xpc_pipe_routine not found");
            }
            Self { routine }
        }

        pub fn is_available(&self) -> bool {
            self.routine.is_some()
        }

        fn routine(&self) -> Result<PipeRoutine> {
            self.routine.ok_or_else(|| {
                Error::UnsupportedPlatform("xpc_pipe_routine is not available".to_string())
            })
        }
    }

    impl Transport for XpcPipeTransport {
        fn ensure_available(&self) -> Result<()> {
            self.routine().map(|_| ())
        }

        fn send(&self, pipe: &PipeHandle, message: &QueryMessage) -> Result<QueryReply> {
            let routine = self.routine()?;

            // The region must outlive the request holding the shmem object.
            let region = message.shmem_size().map(SharedRegion::allocate).transpose()?;
            let request = OwnedXpc::dictionary(message.fields())?;
            if let Some(region) = &region {
                let shmem = OwnedXpc::from_raw(unsafe {
                    xpc_shmem_create(region.addr.as_ptr(), region.len)
                })?;
                request.set(&c_string(KEY_SHMEM)?, &shmem);
            }

            let mut raw_reply: XpcObject = ptr::null_mut();
            let status = unsafe { routine(pipe.as_ptr(), request.as_raw(), &mut raw_reply) };
            if status != 0 {
                tracing::debug!(status, "xpc_pipe_routine failed");
                return Err(Error::Transport {
                    status: i64::from(status),
                });
            }
            let reply = OwnedXpc::from_raw(raw_reply)?;
            reply_from_xpc(&reply, region.as_ref())
        }
    }

    /// Copy the fields we understand out of launchd's reply
    fn reply_from_xpc(reply: &OwnedXpc, region: Option<&SharedRegion>) -> Result<QueryReply> {
        if !reply.is_dictionary() {
            tracing::debug!("xpc_pipe_routine reply is not a dictionary");
            return Err(Error::Transport {
                status: MALFORMED_REPLY_STATUS,
            });
        }

        let mut fields = XpcDictionary::new();
        for key in [KEY_ERROR, KEY_BYTES_WRITTEN].into_iter().chain(info::wire_keys()) {
            if let Some(value) = reply.get(key) {
                fields.insert(key.to_string(), value);
            }
        }

        let written = fields
            .get(KEY_BYTES_WRITTEN)
            .and_then(XpcValue::as_i64)
            .and_then(|n| usize::try_from(n).ok());
        let dump = match (region, written) {
            (Some(region), Some(n)) if n > 0 => Some(region.read_text(n)),
            _ => None,
        };

        Ok(QueryReply { fields, dump })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_non_dictionary_reply_is_transport_error() {
            let reply = OwnedXpc::from_value(&XpcValue::Int64(5)).unwrap();
            assert!(matches!(
                reply_from_xpc(&reply, None),
                Err(Error::Transport {
                    status: MALFORMED_REPLY_STATUS
                })
            ));
        }

        #[test]
        fn test_dictionary_reply_fields_copied() {
            let mut fields = XpcDictionary::new();
            fields.insert(KEY_ERROR.to_string(), XpcValue::Int64(113));
            let reply = OwnedXpc::dictionary(&fields).unwrap();
            let decoded = reply_from_xpc(&reply, None).unwrap();
            assert_eq!(decoded.error_code(), Some(113));
            assert_eq!(decoded.dump, None);
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod imp {
    use crate::common::{Error, Result};
    use crate::ipc::protocol::{QueryMessage, QueryReply};
    use crate::ipc::transport::Transport;
    use crate::locator::PipeHandle;

    /// Transport over `xpc_pipe_routine`; never available off macOS
    #[derive(Debug, Clone, Copy, Default)]
    pub struct XpcPipeTransport;

    impl XpcPipeTransport {
        pub fn detect() -> Self {
            Self
        }

        pub fn is_available(&self) -> bool {
            false
        }

        fn unsupported() -> Error {
            Error::UnsupportedPlatform(format!(
                "xpc_pipe_routine does not exist on {}",
                std::env::consts::OS
            ))
        }
    }

    impl Transport for XpcPipeTransport {
        fn ensure_available(&self) -> Result<()> {
            Err(Self::unsupported())
        }

        fn send(&self, _pipe: &PipeHandle, _message: &QueryMessage) -> Result<QueryReply> {
            Err(Self::unsupported())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_unavailable_off_macos() {
            let transport = XpcPipeTransport::detect();
            assert!(!transport.is_available());
            assert!(matches!(
                transport.ensure_available(),
                Err(Error::UnsupportedPlatform(_))
            ));
        }
    }
}
