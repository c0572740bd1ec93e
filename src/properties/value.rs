#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::package::ObjectIndex;
use crate::properties::PropertyTable;

/// A decoded property value.
///
/// `Byte` is the raw form of `ByteProperty`; when the property carries an
/// enum type name the value is name-backed and decoded as `Enum` instead.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Name(String),
    Text(String),
    Byte(u8),
    Enum { enum_name: String, value: String },
    Struct { struct_type: String, properties: PropertyTable },
    Array { inner_tag: String, values: Vec<Value> },
    Object(ObjectIndex),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Byte(v) => Some(*v as i32),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) | Self::Name(v) | Self::Text(v) => Some(v),
            Self::Enum { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectIndex> {
        match self {
            Self::Object(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&PropertyTable> {
        match self {
            Self::Struct { properties, .. } => Some(properties),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array { values, .. } => Some(values),
            _ => None,
        }
    }
}
