//! Dynamically-typed machine values.
//!
//! The machine is untyped at this layer: a value is any host primitive
//! (number, boolean, string), an explicit null, or an opaque reference
//! handle. Numbers follow host `f64` semantics. Absence of a binding is
//! expressed with `Option<Value>`, never with an in-band sentinel, so a
//! binding to `Null` is always distinguishable from "not bound".

use std::fmt;
use std::rc::Rc;

/// A single machine value.
///
/// Values are cheap to clone: strings are reference-counted and every
/// other variant is `Copy`-sized.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null, a legal binding target.
    Null,
    Bool(bool),
    /// Host number semantics (IEEE 754 double).
    Num(f64),
    Str(Rc<str>),
    /// Opaque reference handle; the machine never looks inside it.
    Ref(u64),
}

impl Value {
    /// Creates a string value from any string-ish input.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Numeric coercion used by the arithmetic and comparison operators.
    ///
    /// Mirrors host-language number conversion: booleans become 0/1,
    /// null becomes 0, strings parse as a number (empty string is 0,
    /// anything unparseable is NaN), references are NaN.
    pub fn as_num(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Num(n) => *n,
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Ref(_) => f64::NAN,
        }
    }

    /// Truthiness: false for null, `false`, zero/NaN, and the empty
    /// string; true for everything else (references included).
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Ref(_) => true,
        }
    }

    /// Strict equality: same variant, same payload. NaN is not equal
    /// to itself, matching host number semantics.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => {
                // Whole numbers print without a trailing ".0".
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::Ref(id) => write!(f, "&{id}"),
        }
    }
}
