//! Option values as stored by the remote config store.
//!
//! The store only knows two shapes: a scalar string and an ordered list
//! of strings. Anything else in a wire payload is a frame error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single option value: scalar string or string list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    List(Vec<String>),
}

impl Value {
    /// Scalar view of the value. Lists render as space-joined tokens,
    /// mirroring how the store serializes list options.
    pub fn as_scalar(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::List(items) => items.join(" "),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::String(_) => None,
            Self::List(items) => Some(items),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_scalar())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_serde() {
        let scalar: Value = serde_json::from_str("\"static\"").unwrap();
        assert_eq!(scalar, Value::from("static"));

        let list: Value = serde_json::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(list, Value::from(vec!["a", "b"]));
    }

    #[test]
    fn scalar_view_joins_lists() {
        assert_eq!(Value::from(vec!["a", "b"]).as_scalar(), "a b");
        assert_eq!(Value::from("x").as_scalar(), "x");
    }
}
