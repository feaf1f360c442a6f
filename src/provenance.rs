//! Launch provenance derived from launchd's process info
//!
//! launchd records how a process came to exist in its `path` and `program`
//! attributes. A job submitted by another process has a path like
//! `(submitted by smd.411)`; a job loaded from a property list has the plist
//! path; `program` is what launchd originally executed, which differs from
//! the current image after an exec.

use serde::Serialize;

use crate::ipc::ProcessInfo;

/// How launchd says a process was started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaunchProvenance {
    pub submitted_by_pid: Option<i64>,
    pub submitted_by_name: Option<String>,
    pub plist_path: Option<String>,
    pub program_path: Option<String>,
}

impl LaunchProvenance {
    pub fn from_info(info: &ProcessInfo) -> Self {
        let path = info.get_str("path");
        let submitted = path.and_then(parse_submitted_by);
        Self {
            submitted_by_pid: submitted.as_ref().and_then(|(_, pid)| *pid),
            submitted_by_name: submitted.map(|(name, _)| name),
            plist_path: path.and_then(parse_plist_path),
            program_path: info.get_str("program").map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `(submitted by <name>.<pid>)` → name, and pid when it parses
fn parse_submitted_by(path: &str) -> Option<(String, Option<i64>)> {
    let rest = path.split_once("submitted by ")?.1;
    let rest = rest.trim().trim_end_matches(')').trim();
    let (name, pid) = match rest.rsplit_once('.') {
        Some((name, pid)) => (name, pid.trim().parse().ok()),
        None => (rest, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), pid))
}

/// Plist path: the text after the last `=`, or the whole value
fn parse_plist_path(path: &str) -> Option<String> {
    if !path.contains(".plist") {
        return None;
    }
    let tail = path.rsplit('=').next().unwrap_or(path);
    Some(tail.trim().to_string())
}
