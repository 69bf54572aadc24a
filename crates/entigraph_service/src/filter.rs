//! List filters.

use entigraph_core::RawPayload;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Parameters of a collection read.
///
/// Equality conditions restrict which records match; plain parameters
/// are forwarded to the upstream but never used for matching (`all=true`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: BTreeMap<String, Value>,
    params: BTreeMap<String, Value>,
}

impl Filter {
    /// Creates an empty filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Adds a pass-through parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns true if the filter has no conditions and no parameters.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.params.is_empty()
    }

    /// Returns the equality conditions.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if `record` satisfies every condition.
    ///
    /// Scalars compare by their rendered text, so a condition parsed from
    /// a command line (`"7"`) matches a numeric wire value (`7`).
    pub fn matches(&self, record: &RawPayload) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            record
                .get(key)
                .is_some_and(|actual| actual == expected || render(actual) == render(expected))
        })
    }

    /// Renders conditions and parameters as a URL query string, keys sorted.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<_> = self.conditions.iter().chain(self.params.iter()).collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(&render(value))))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
