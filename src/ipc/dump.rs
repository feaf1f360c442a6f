//! Parser for launchd's textual process dump
//!
//! ```text
//! com.apple.Finder = {
//!     active count = 1
//!     path = /System/Library/LaunchAgents/com.apple.Finder.plist
//!     pid = 512
//!     environment = {
//!         HOME => /Users/me
//!     }
//! }
//! ```

/// Fields pulled from a dump
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DumpFields {
    /// Label of the outermost block
    pub label: Option<String>,
    /// Top-level `key = value` pairs in order, first occurrence only
    pub fields: Vec<(String, String)>,
}

impl DumpFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse dump text
///
/// Only lines directly inside the outermost block (or at top level, for dumps
/// without one) become fields. Nested blocks are skipped whole.
pub fn parse(text: &str) -> DumpFields {
    let mut out = DumpFields::default();
    let mut depth = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('}') {
            depth = depth.saturating_sub(1);
            continue;
        }

        let Some((key, value)) = line.split_once(" = ") else {
            if line.ends_with('{') {
                depth += 1;
            }
            continue;
        };
        let key = key.trim().trim_matches('"');
        let value = value.trim();

        if value == "{" {
            if depth == 0 && out.label.is_none() {
                out.label = Some(key.to_string());
            }
            depth += 1;
            continue;
        }

        if depth <= 1 && out.get(key).is_none() {
            out.fields.push((key.to_string(), value.to_string()));
        }
    }

    out
}
