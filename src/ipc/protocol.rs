//! launchd request/reply message types
//!
//! launchd's XPC routines take a dictionary addressed by subsystem and
//! routine number. The process dump routine answers with a small dictionary
//! and writes a launchctl-style text dump into a shared memory buffer the
//! caller attaches to the request.

use std::collections::BTreeMap;

// === Request tags ===

/// Subsystem number of launchd's domain/process routines
pub const SUBSYSTEM: u64 = 2;
/// Dump-process routine (`ROUTINE_DUMP_PROCESS`)
pub const ROUTINE_DUMP_PROCESS: u64 = 0x2c4;
/// Request handle, unused by this routine
pub const HANDLE: u64 = 0;
/// Request type for a process lookup
pub const REQUEST_TYPE: u64 = 1;

// === Wire keys ===

pub const KEY_SUBSYSTEM: &str = "subsystem";
pub const KEY_HANDLE: &str = "handle";
pub const KEY_ROUTINE: &str = "routine";
pub const KEY_TYPE: &str = "type";
pub const KEY_PID: &str = "pid";
pub const KEY_SHMEM: &str = "shmem";
pub const KEY_ERROR: &str = "error";
pub const KEY_BYTES_WRITTEN: &str = "bytes-written";

/// Named fields of an XPC dictionary
pub type XpcDictionary = BTreeMap<String, XpcValue>;

/// The subset of XPC object types these messages use
#[derive(Debug, Clone, PartialEq)]
pub enum XpcValue {
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    String(String),
    Data(Vec<u8>),
    Array(Vec<XpcValue>),
    Dictionary(XpcDictionary),
}

impl XpcValue {
    /// Integer value, if this is an int64 or a uint64 that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            XpcValue::Int64(v) => Some(*v),
            XpcValue::Uint64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            XpcValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            XpcValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for XpcValue {
    fn from(s: &str) -> Self {
        XpcValue::String(s.to_string())
    }
}

impl From<i64> for XpcValue {
    fn from(v: i64) -> Self {
        XpcValue::Int64(v)
    }
}

impl From<u64> for XpcValue {
    fn from(v: u64) -> Self {
        XpcValue::Uint64(v)
    }
}

impl From<bool> for XpcValue {
    fn from(v: bool) -> Self {
        XpcValue::Bool(v)
    }
}

/// One request to launchd
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    fields: XpcDictionary,
    shmem_size: Option<usize>,
}

impl QueryMessage {
    /// Dump-process request for `pid`, asking for a `shmem_size` byte buffer
    pub fn process_info(pid: i32, shmem_size: usize) -> Self {
        let mut fields = XpcDictionary::new();
        fields.insert(KEY_SUBSYSTEM.to_string(), SUBSYSTEM.into());
        fields.insert(KEY_HANDLE.to_string(), HANDLE.into());
        fields.insert(KEY_ROUTINE.to_string(), ROUTINE_DUMP_PROCESS.into());
        fields.insert(KEY_TYPE.to_string(), REQUEST_TYPE.into());
        fields.insert(KEY_PID.to_string(), i64::from(pid).into());
        Self {
            fields,
            shmem_size: Some(shmem_size),
        }
    }

    pub fn fields(&self) -> &XpcDictionary {
        &self.fields
    }

    /// Size of the shared buffer the transport must attach under `shmem`
    pub fn shmem_size(&self) -> Option<usize> {
        self.shmem_size
    }

    /// Target pid carried by the request
    pub fn pid(&self) -> Option<i64> {
        self.fields.get(KEY_PID).and_then(XpcValue::as_i64)
    }
}

/// launchd's answer to one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryReply {
    /// Reply dictionary fields
    pub fields: XpcDictionary,
    /// Text launchd wrote into the shared buffer, bounded by `bytes-written`
    pub dump: Option<String>,
}

impl QueryReply {
    /// Reply from explicit fields, in any order
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, XpcValue)>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            dump: None,
        }
    }

    /// Attach the shared-buffer dump text
    pub fn with_dump(mut self, dump: impl Into<String>) -> Self {
        let dump = dump.into();
        self.fields
            .insert(KEY_BYTES_WRITTEN.to_string(), (dump.len() as u64).into());
        self.dump = Some(dump);
        self
    }

    /// Daemon error code, when the reply carries a nonzero one
    pub fn error_code(&self) -> Option<i64> {
        self.fields
            .get(KEY_ERROR)
            .and_then(XpcValue::as_i64)
            .filter(|code| *code != 0)
    }
}

/// Whether a reply key is protocol bookkeeping rather than process data
pub fn is_protocol_key(key: &str) -> bool {
    matches!(key, KEY_ERROR | KEY_BYTES_WRITTEN | KEY_SHMEM)
}
