//! Typed field access over a generic property tree
//!
//! Every accessor reports presence explicitly and never coerces: a number is
//! never read as a string, a string is never parsed as a number.
//!
//! ```rust
//! use packgen_core::fields::{self, Field};
//! use serde_json::json;
//!
//! let spec = json!({ "replicas": 3, "serviceName": "db" });
//!
//! assert_eq!(fields::integer(&spec, &["replicas"]), Field::Present(3));
//! assert_eq!(fields::string(&spec, &["missing"]), Field::Absent);
//! assert!(fields::string(&spec, &["replicas"]).is_mismatch());
//! ```

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{CoreError, Result};

/// Shape of a JSON node, used in mismatch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a typed lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// Path not present (or explicitly null)
    Absent,
    /// Present with the expected type
    Present(T),
    /// Present with a different type
    Mismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

impl<T> Field<T> {
    /// Present value, treating a mismatch like an absent field
    pub fn ok(self) -> Option<T> {
        match self {
            Field::Present(v) => Some(v),
            Field::Absent => None,
            Field::Mismatch {
                path,
                expected,
                found,
            } => {
                tracing::debug!(%path, %expected, %found, "ignoring field with unexpected type");
                None
            }
        }
    }

    /// Present value, or an error naming `path`
    pub fn require(self, path: &str) -> Result<T> {
        match self {
            Field::Present(v) => Ok(v),
            Field::Absent => Err(CoreError::MissingField {
                field: path.to_string(),
            }),
            Field::Mismatch {
                path,
                expected,
                found,
            } => Err(CoreError::TypeMismatch {
                field: path,
                expected: expected.as_str(),
                found: found.as_str(),
            }),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Field::Mismatch { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Present(v) => Field::Present(f(v)),
            Field::Absent => Field::Absent,
            Field::Mismatch {
                path,
                expected,
                found,
            } => Field::Mismatch {
                path,
                expected,
                found,
            },
        }
    }
}

/// Any node at `path`
pub fn value<'a>(root: &'a Value, path: &[&str]) -> Field<&'a Value> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        match current {
            Value::Object(map) => match map.get(*segment) {
                Some(next) => current = next,
                None => return Field::Absent,
            },
            Value::Null => return Field::Absent,
            other => {
                return Field::Mismatch {
                    path: path[..depth].join("."),
                    expected: ValueKind::Mapping,
                    found: ValueKind::of(other),
                };
            }
        }
    }
    if current.is_null() {
        Field::Absent
    } else {
        Field::Present(current)
    }
}

fn typed<'a, T>(
    root: &'a Value,
    path: &[&str],
    expected: ValueKind,
    extract: impl FnOnce(&'a Value) -> Option<T>,
) -> Field<T> {
    match value(root, path) {
        Field::Present(v) => match extract(v) {
            Some(t) => Field::Present(t),
            None => Field::Mismatch {
                path: path.join("."),
                expected,
                found: ValueKind::of(v),
            },
        },
        Field::Absent => Field::Absent,
        Field::Mismatch {
            path,
            expected,
            found,
        } => Field::Mismatch {
            path,
            expected,
            found,
        },
    }
}

pub fn string<'a>(root: &'a Value, path: &[&str]) -> Field<&'a str> {
    typed(root, path, ValueKind::String, Value::as_str)
}

/// Integer field; floating point numbers are a mismatch
pub fn integer(root: &Value, path: &[&str]) -> Field<i64> {
    typed(root, path, ValueKind::Number, Value::as_i64)
}

pub fn boolean(root: &Value, path: &[&str]) -> Field<bool> {
    typed(root, path, ValueKind::Bool, Value::as_bool)
}

pub fn mapping<'a>(root: &'a Value, path: &[&str]) -> Field<&'a Map<String, Value>> {
    typed(root, path, ValueKind::Mapping, Value::as_object)
}

pub fn sequence<'a>(root: &'a Value, path: &[&str]) -> Field<&'a Vec<Value>> {
    typed(root, path, ValueKind::Sequence, Value::as_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "spec": {
                "replicas": 3,
                "paused": false,
                "ratio": 0.5,
                "selector": { "matchLabels": { "app": "web" } },
                "ports": [{ "port": 80 }],
                "nothing": null,
                "name": "web"
            }
        })
    }

    #[test]
    fn test_present_values() {
        let v = sample();
        assert_eq!(integer(&v, &["spec", "replicas"]), Field::Present(3));
        assert_eq!(boolean(&v, &["spec", "paused"]), Field::Present(false));
        assert_eq!(string(&v, &["spec", "name"]), Field::Present("web"));
        assert_eq!(sequence(&v, &["spec", "ports"]).ok().map(Vec::len), Some(1));
        assert!(mapping(&v, &["spec", "selector", "matchLabels"]).is_present());
    }

    #[test]
    fn test_absent_and_null() {
        let v = sample();
        assert!(string(&v, &["spec", "missing"]).is_absent());
        assert!(string(&v, &["spec", "nothing"]).is_absent());
        assert!(string(&v, &["status", "phase"]).is_absent());
    }

    #[test]
    fn test_no_coercion() {
        let v = sample();
        let field = string(&v, &["spec", "replicas"]);
        assert_eq!(
            field,
            Field::Mismatch {
                path: "spec.replicas".to_string(),
                expected: ValueKind::String,
                found: ValueKind::Number,
            }
        );
        assert!(integer(&v, &["spec", "ratio"]).is_mismatch());
        assert!(integer(&v, &["spec", "name"]).is_mismatch());
    }

    #[test]
    fn test_mismatch_on_intermediate_segment() {
        let v = sample();
        match string(&v, &["spec", "name", "first"]) {
            Field::Mismatch { path, found, .. } => {
                assert_eq!(path, "spec.name");
                assert_eq!(found, ValueKind::String);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_ok_and_require() {
        let v = sample();
        assert_eq!(string(&v, &["spec", "replicas"]).ok(), None);
        assert_eq!(integer(&v, &["spec", "replicas"]).require("spec.replicas").unwrap(), 3);

        let err = string(&v, &["spec", "missing"]).require("spec.missing").unwrap_err();
        assert!(err.to_string().contains("spec.missing"));

        let err = string(&v, &["spec", "replicas"]).require("spec.replicas").unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn test_map_preserves_state() {
        let v = sample();
        assert_eq!(integer(&v, &["spec", "replicas"]).map(|n| n * 2), Field::Present(6));
        assert!(integer(&v, &["spec", "name"]).map(|n| n * 2).is_mismatch());
    }
}
