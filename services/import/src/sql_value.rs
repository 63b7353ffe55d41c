//! Scalar typing for the import pipeline.
//!
//! Incoming records are dynamically shaped JSON. Before anything reaches the
//! database, every leaf value is classified into a closed set of SQL scalars;
//! values with no relational representation (null, nested objects, arrays)
//! yield no scalar at all, and callers treat that as "skip the field" rather
//! than "insert NULL".

use serde_json::Value;

/// A JSON leaf value classified for storage.
///
/// Booleans keep their own variant: they live in NUMERIC columns and are
/// bound as 1/0.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlScalar {
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl SqlScalar {
    /// SQL column type this scalar infers.
    pub fn sql_type(&self) -> &'static str {
        match self {
            SqlScalar::Integer(_) => "INTEGER",
            SqlScalar::Real(_) => "REAL",
            SqlScalar::Text(_) => "TEXT",
            SqlScalar::Boolean(_) => "NUMERIC",
        }
    }

    /// Classify a JSON value, or `None` when it has no scalar representation.
    ///
    /// Whole-valued floats are promoted to `Integer` so a counter that
    /// serializes as `12.0` in one dump and `12` in another infers the same
    /// column type.
    pub fn from_json(value: &Value) -> Option<SqlScalar> {
        match value {
            Value::Bool(b) => Some(SqlScalar::Boolean(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(SqlScalar::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    // Beyond i64 range; keep the magnitude as REAL.
                    Some(SqlScalar::Real(u as f64))
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Some(SqlScalar::Integer(f as i64))
                    } else {
                        Some(SqlScalar::Real(f))
                    }
                }
            }
            Value::String(s) => Some(SqlScalar::Text(s.clone())),
            Value::Null | Value::Object(_) | Value::Array(_) => None,
        }
    }
}
