//! Case-insensitive field lookup for loosely shaped SAP payloads.
//!
//! SAP endpoints (and the proxies placed in front of them) are not
//! consistent about key casing: the same payload may carry `Status`,
//! `status` or `STATUS`. Every lookup goes through [`FieldResolver`] so
//! the rest of the code deals with one typed value.

use serde_json::{Map, Value};

/// Resolves keys of a JSON object without regard to ASCII case.
///
/// An exact match wins over a case-insensitive one, so payloads carrying
/// both `Status` and `status` behave predictably.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    object: &'a Map<String, Value>,
}

impl<'a> FieldResolver<'a> {
    /// Wraps a JSON object.
    #[must_use]
    pub const fn new(object: &'a Map<String, Value>) -> Self {
        Self { object }
    }

    /// Wraps a JSON value if it is an object.
    #[must_use]
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.as_object().map(Self::new)
    }

    /// Returns the raw value stored under `key`, ignoring case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key).or_else(|| {
            self.object
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    /// Returns the value under `key` as text.
    ///
    /// Strings are returned as-is, numbers and booleans are rendered.
    /// `null`, arrays, objects and empty strings yield `None`.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}
