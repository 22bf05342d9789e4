//! Python-style values used as dict keys and values.

use std::fmt;

use serde::Serialize;

/// A small closed universe of Python values: enough to drive every table
/// operation with real CPython semantics. `List` is representable (it can
/// arrive over the wire) but unhashable, exactly like a Python list.
///
/// Equality is Python equality restricted to this universe: values of
/// different variants never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PyValue {
    None,
    Int(i64),
    Str(String),
    List(Vec<PyValue>),
}

impl PyValue {
    /// Python type name, as it would appear in a `TypeError`.
    pub fn type_name(&self) -> &'static str {
        match self {
            PyValue::None => "NoneType",
            PyValue::Int(_) => "int",
            PyValue::Str(_) => "str",
            PyValue::List(_) => "list",
        }
    }

    pub fn is_hashable(&self) -> bool {
        !matches!(self, PyValue::List(_))
    }
}

impl From<i64> for PyValue {
    fn from(x: i64) -> Self {
        PyValue::Int(x)
    }
}

impl From<&str> for PyValue {
    fn from(s: &str) -> Self {
        PyValue::Str(s.to_string())
    }
}

impl From<String> for PyValue {
    fn from(s: String) -> Self {
        PyValue::Str(s)
    }
}

impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyValue::None => write!(f, "None"),
            PyValue::Int(x) => write!(f, "{x}"),
            PyValue::Str(s) => write!(f, "{s:?}"),
            PyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
