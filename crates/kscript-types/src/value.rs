//! Primitive target-language values and their pinned arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive kind of a target-language slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimType {
    Int,
    Real,
    Str,
}

impl PrimType {
    /// Sigil prefix for a declared name of this kind.
    ///
    /// Scalars use `$ ~ @`, arrays `% ? !`.
    pub fn sigil(self, array: bool) -> char {
        match (self, array) {
            (PrimType::Int, false) => '$',
            (PrimType::Real, false) => '~',
            (PrimType::Str, false) => '@',
            (PrimType::Int, true) => '%',
            (PrimType::Real, true) => '?',
            (PrimType::Str, true) => '!',
        }
    }
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimType::Int => write!(f, "int"),
            PrimType::Real => write!(f, "real"),
            PrimType::Str => write!(f, "str"),
        }
    }
}

/// A concrete value with the target language's primitive kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
}

impl Value {
    pub fn ty(&self) -> PrimType {
        match self {
            Value::Int(_) => PrimType::Int,
            Value::Real(_) => PrimType::Real,
            Value::Str(_) => PrimType::Str,
        }
    }

    /// Default value of a kind, used for uninitialized slots.
    pub fn default_of(ty: PrimType) -> Value {
        match ty {
            PrimType::Int => Value::Int(0),
            PrimType::Real => Value::Real(0.0),
            PrimType::Str => Value::Str(String::new()),
        }
    }

    /// Render the value as a target-language literal.
    ///
    /// Strings are double-quoted, reals always carry a decimal point.
    pub fn literal(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Real(v) => {
                // `Display` expands the full decimal form but drops a
                // trailing `.0`; put it back so the kind stays visible.
                let s = v.to_string();
                if s.contains('.') {
                    s
                } else {
                    format!("{s}.0")
                }
            }
            Value::Str(v) => format!("\"{v}\""),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Integer division as the target performs it: floored toward
/// negative infinity, with division by zero yielding 0.
pub fn floor_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Modulo paired with [`floor_div`]: the result takes the divisor's
/// sign. Modulo by zero yields 0.
pub fn floor_mod(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    a - b * floor_div(a, b)
}
