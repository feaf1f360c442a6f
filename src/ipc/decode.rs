//! Reply decoding

use crate::common::{Error, Result};

use super::dump;
use super::info::{self, ProcessInfo};
use super::protocol::{is_protocol_key, QueryReply};

/// Turn a launchd reply into [`ProcessInfo`]
///
/// An error code in `not_found_codes` gives an empty result; any other
/// nonzero code is a transport failure. Dump fields are applied first, then
/// structured reply fields, so the structured value wins on conflicts.
pub fn decode_reply(reply: &QueryReply, not_found_codes: &[i64]) -> Result<ProcessInfo> {
    if let Some(code) = reply.error_code() {
        if not_found_codes.contains(&code) {
            tracing::debug!(code, "launchd has no record of process");
            return Ok(ProcessInfo::new());
        }
        return Err(Error::Transport { status: code });
    }

    let mut out = ProcessInfo::new();

    if let Some(text) = reply.dump.as_deref() {
        let parsed = dump::parse(text);
        for (key, raw) in &parsed.fields {
            if let Some(attr) = info::lookup(key) {
                if let Some(value) = attr.coerce_text(raw) {
                    out.insert(attr.key, value);
                }
            }
        }
        if let Some(label) = parsed.label {
            if !out.contains_key("name") {
                out.insert("name", label);
            }
        }
    }

    for (key, value) in &reply.fields {
        if is_protocol_key(key) {
            continue;
        }
        let Some(attr) = info::lookup(key) else {
            tracing::trace!(key = %key, "ignoring unknown reply field");
            continue;
        };
        if let Some(value) = attr.coerce_value(value) {
            out.insert(attr.key, value);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::info::AttrValue;
    use crate::ipc::protocol::{XpcValue, KEY_ERROR};

    const NOT_FOUND: &[i64] = &[3, 113];

    #[test]
    fn test_structured_fields() {
        let reply = QueryReply::from_fields([
            ("responsiblePid", XpcValue::Int64(1)),
            ("name", XpcValue::from("Finder")),
        ]);
        let info = decode_reply(&reply, NOT_FOUND).unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info.get_str("name"), Some("Finder"));
        assert_eq!(info.get_int("responsiblePid"), Some(1));
    }

    #[test]
    fn test_not_found_sentinel_is_empty() {
        for code in NOT_FOUND {
            let reply = QueryReply::from_fields([(KEY_ERROR, XpcValue::Int64(*code))]);
            assert!(decode_reply(&reply, NOT_FOUND).unwrap().is_empty());
        }
    }

    #[test]
    fn test_other_error_is_transport() {
        let reply = QueryReply::from_fields([(KEY_ERROR, XpcValue::Int64(1))]);
        assert!(matches!(
            decode_reply(&reply, NOT_FOUND),
            Err(Error::Transport { status: 1 })
        ));
    }

    #[test]
    fn test_dump_fields_and_label() {
        let reply = QueryReply::default()
            .with_dump("com.apple.Finder = {\n\tpid = 512\n\tresponsible pid = 512\n}\n");
        let info = decode_reply(&reply, NOT_FOUND).unwrap();
        assert_eq!(info.get_str("name"), Some("com.apple.Finder"));
        assert_eq!(info.get_int("pid"), Some(512));
        assert_eq!(info.get_int("responsiblePid"), Some(512));
    }

    #[test]
    fn test_structured_overrides_dump() {
        let reply = QueryReply::from_fields([("name", XpcValue::from("Finder"))])
            .with_dump("com.apple.Finder = {\n\tstate = running\n}\n");
        let info = decode_reply(&reply, NOT_FOUND).unwrap();
        assert_eq!(info.get_str("name"), Some("Finder"));
        assert_eq!(info.get("state"), Some(&AttrValue::from("running")));
        assert!(!info.contains_key("bytes-written"));
    }

    #[test]
    fn test_uncoercible_value_omitted() {
        let reply = QueryReply::from_fields([
            ("pid", XpcValue::from("unknown")),
            ("name", XpcValue::from("Dock")),
        ]);
        let info = decode_reply(&reply, NOT_FOUND).unwrap();
        assert!(!info.contains_key("pid"));
        assert_eq!(info.get_str("name"), Some("Dock"));
    }
}
