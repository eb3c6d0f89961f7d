//! The value model stored inside containers.
//!
//! A value is either a plain scalar or a reference to a nested
//! container. Container references carry only the container's identity;
//! the referenced state lives in the document, not in the value.

use serde::Deserialize;
use serde::Serialize;

use super::id::ContainerId;

/// A value stored in a map entry or sequence element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float. Serialized by bit pattern so every value,
    /// non-finite ones included, survives the wire losslessly.
    Float(#[serde(with = "float_bits")] f64),
    /// A UTF-8 string.
    Str(String),
    /// A reference to a nested container.
    Container(ContainerId),
}

/// Lossless float encoding.
///
/// JSON has no representation for NaN or the infinities; serializing
/// them as numbers degrades to `null` and fails to decode on the other
/// side. Carrying the raw bit pattern instead makes every float
/// round-trip exactly.
mod float_bits {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.serialize_u64(value.to_bits());
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        return Ok(f64::from_bits(bits));
    }
}

impl Value {
    /// The container identity, if this value is a container reference.
    pub fn as_container(&self) -> Option<&ContainerId> {
        match self {
            Value::Container(id) => Some(id),
            _ => None,
        }
    }

    /// Whether this value is a container reference.
    pub fn is_container(&self) -> bool {
        return self.as_container().is_some();
    }

    /// The integer, if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The string slice, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        return Value::Bool(value);
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        return Value::Int(value);
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Value {
        return Value::Int(value as i64);
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        return Value::Float(value);
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        return Value::Str(value.to_string());
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        return Value::Str(value);
    }
}

impl From<ContainerId> for Value {
    fn from(value: ContainerId) -> Value {
        return Value::Container(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::id::ContainerKind;

    #[test]
    fn scalar_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from("hi"), Value::Str("hi".to_string()));
    }

    #[test]
    fn floats_round_trip_by_bit_pattern() {
        for f in [1.5, -0.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::MIN_POSITIVE] {
            let encoded = serde_json::to_vec(&Value::Float(f)).expect("serializes");
            let decoded: Value = serde_json::from_slice(&encoded).expect("decodes");
            match decoded {
                Value::Float(g) => assert_eq!(g.to_bits(), f.to_bits()),
                other => panic!("expected a float, got {:?}", other),
            }
        }
    }

    #[test]
    fn container_accessor() {
        let id = ContainerId::root(ContainerKind::Map, "a");
        let value = Value::from(id.clone());

        assert!(value.is_container());
        assert_eq!(value.as_container(), Some(&id));
        assert!(!Value::Int(1).is_container());
        assert_eq!(Value::Int(1).as_container(), None);
    }

    #[test]
    fn scalar_accessors() {
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Str("x".to_string()).as_str(), Some("x"));
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
        assert_eq!(Value::Null.as_int(), None);
    }
}
