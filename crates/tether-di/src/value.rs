//! Named-parameter value types and string parsing

use std::fmt;

use crate::{DIError, DIResult};

/// The type a named parameter's raw string is parsed into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    /// Name of an implementation assignable to the given interface
    Class(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Class(interface) => write!(f, "class implementing {}", interface),
        }
    }
}

/// A parsed named-parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Class(String),
}

impl Value {
    /// Render the value back to the text it parses from
    pub fn to_raw(&self) -> String {
        match self {
            Value::String(s) | Value::Class(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this value may be stored in a parameter of `value_type`
    pub fn conforms_to(&self, value_type: &ValueType) -> bool {
        matches!(
            (self, value_type),
            (Value::String(_), ValueType::String)
                | (Value::Integer(_), ValueType::Integer)
                | (Value::Float(_), ValueType::Float)
                | (Value::Boolean(_), ValueType::Boolean)
                | (Value::Class(_), ValueType::Class(_))
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Parse `raw` into `value_type` for the named parameter `parameter`.
///
/// Class-typed values are only checked for being non-empty here; the
/// builder validates them against the catalog.
pub fn parse(parameter: &str, value_type: &ValueType, raw: &str) -> DIResult<Value> {
    let invalid = || DIError::InvalidValue {
        parameter: parameter.to_string(),
        value: raw.to_string(),
        expected: value_type.to_string(),
    };

    match value_type {
        ValueType::String => Ok(Value::String(raw.to_string())),
        ValueType::Integer => raw.trim().parse().map(Value::Integer).map_err(|_| invalid()),
        ValueType::Float => raw.trim().parse().map(Value::Float).map_err(|_| invalid()),
        ValueType::Boolean => match raw.trim() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(invalid()),
        },
        ValueType::Class(_) => {
            let name = raw.trim();
            if name.is_empty() {
                Err(invalid())
            } else {
                Ok(Value::Class(name.to_string()))
            }
        }
    }
}
