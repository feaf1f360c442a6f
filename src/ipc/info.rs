//! Decoded process information and the attribute schema

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::protocol::XpcValue;

/// One attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// Attributes launchd reported for one process, sorted by name
///
/// Empty when launchd has no record of the pid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessInfo(BTreeMap<String, AttrValue>);

impl ProcessInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(AttrValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(AttrValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(AttrValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> BTreeMap<String, AttrValue> {
        self.0
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for ProcessInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Value kind an attribute is normalized to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    String,
    Int,
    Bool,
}

/// A known attribute and the keys launchd uses for it
#[derive(Debug)]
pub struct Attribute {
    /// Key in [`ProcessInfo`]
    pub key: &'static str,
    /// Keys seen in structured replies and in dump text
    pub wire: &'static [&'static str],
    pub kind: AttrKind,
}

pub const ATTRIBUTES: &[Attribute] = &[
    Attribute { key: "name", wire: &["name", "label"], kind: AttrKind::String },
    Attribute {
        key: "responsiblePid",
        wire: &["responsiblePid", "responsible pid"],
        kind: AttrKind::Int,
    },
    Attribute { key: "pid", wire: &["pid"], kind: AttrKind::Int },
    Attribute { key: "path", wire: &["path"], kind: AttrKind::String },
    Attribute { key: "program", wire: &["program"], kind: AttrKind::String },
    Attribute { key: "state", wire: &["state"], kind: AttrKind::String },
    Attribute { key: "domain", wire: &["domain"], kind: AttrKind::String },
    Attribute { key: "type", wire: &["type"], kind: AttrKind::String },
    Attribute { key: "bundleId", wire: &["bundleId", "bundle id"], kind: AttrKind::String },
    Attribute {
        key: "lastExitCode",
        wire: &["lastExitCode", "last exit code"],
        kind: AttrKind::Int,
    },
    Attribute {
        key: "activeCount",
        wire: &["activeCount", "active count"],
        kind: AttrKind::Int,
    },
    Attribute { key: "sandboxed", wire: &["sandboxed"], kind: AttrKind::Bool },
];

/// Find the attribute a wire key belongs to
pub fn lookup(wire_key: &str) -> Option<&'static Attribute> {
    ATTRIBUTES.iter().find(|a| a.wire.contains(&wire_key))
}

/// Every wire key of every known attribute
pub fn wire_keys() -> impl Iterator<Item = &'static str> {
    ATTRIBUTES.iter().flat_map(|a| a.wire.iter().copied())
}

impl Attribute {
    /// Normalize a structured reply value; `None` if it cannot be represented
    pub fn coerce_value(&self, value: &XpcValue) -> Option<AttrValue> {
        match (self.kind, value) {
            (AttrKind::String, XpcValue::String(s)) => Some(AttrValue::String(s.clone())),
            (AttrKind::Int, v) if v.as_i64().is_some() => v.as_i64().map(AttrValue::Int),
            (AttrKind::Int, XpcValue::String(s)) => s.trim().parse().ok().map(AttrValue::Int),
            (AttrKind::Bool, XpcValue::Bool(b)) => Some(AttrValue::Bool(*b)),
            (AttrKind::Bool, XpcValue::String(s)) => parse_bool(s).map(AttrValue::Bool),
            _ => None,
        }
    }

    /// Normalize a value read from dump text
    pub fn coerce_text(&self, text: &str) -> Option<AttrValue> {
        match self.kind {
            AttrKind::String => Some(AttrValue::String(text.to_string())),
            AttrKind::Int => text.trim().parse().ok().map(AttrValue::Int),
            AttrKind::Bool => parse_bool(text).map(AttrValue::Bool),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
