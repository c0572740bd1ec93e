//! The typed property model: decoding of per-export property streams and
//! the ordered [`PropertyTable`] container.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::package::{NameRef, NameTable, ObjectIndex, SENTINEL_NONE};
use crate::stream::ByteStream;
use crate::Error;

mod value;
pub use value::Value;

/// One named, typed entry of a property stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Property {
    pub name: String,
    pub tag: String,
    pub value: Value,
}

/// Ordered sequence of properties, immutable once parsed.
///
/// Declaration order is preserved. Duplicate names are legal: the legacy
/// encoding represents multi-value arrays as repeated entries under one
/// name, so [`PropertyTable::get`] returns the first match and
/// [`PropertyTable::get_all`] yields every match in order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PropertyTable {
    entries: Vec<Property>,
}

impl PropertyTable {
    /// Decodes a sentinel-terminated property stream.
    ///
    /// Entries are `(name, type tag, size, payload)`; a name resolving to
    /// `None` ends the table. Unknown type tags are skipped by their
    /// declared size, logged, and never fatal. A known tag whose payload
    /// does not consume exactly its declared size indicates a
    /// desynchronized stream and is a format violation.
    pub(crate) fn decode(stream: &mut ByteStream, names: &NameTable) -> Result<Self, Error> {
        let mut entries = Vec::new();
        loop {
            let name = names.resolve(NameRef::read(stream)?)?;
            if name == SENTINEL_NONE {
                break;
            }
            let tag = names.resolve(NameRef::read(stream)?)?;
            let size = stream.read_u32()? as usize;

            // A boolean's value lives in the size field; no payload follows.
            if tag == "BoolProperty" {
                entries.push(Property {
                    name,
                    tag,
                    value: Value::Bool(size != 0),
                });
                continue;
            }

            let start = stream.offset();
            match read_value(&tag, stream, names)? {
                Some(value) => {
                    let consumed = stream.offset() - start;
                    if consumed != size {
                        return Err(Error::Format(format!(
                            "{tag} '{name}' consumed {consumed} bytes but declared {size}"
                        )));
                    }
                    entries.push(Property { name, tag, value });
                }
                None => {
                    log::warn!("skipping unknown property type {tag} for '{name}' ({size} bytes)");
                    stream.set_offset(start + size)?;
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value declared under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.get(name).unwrap_or(default)
    }

    /// Every value declared under `name`, in declaration order.
    pub fn get_all(&self, name: &str) -> Vec<&Value> {
        self.entries
            .iter()
            .filter(|p| p.name == name)
            .map(|p| &p.value)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|p| p.name == name)
    }

    /// Folds the table into name-to-value form.
    ///
    /// Fails if a name is declared more than once at this level; callers
    /// use this only where duplicates would mean corrupted data.
    pub fn as_dict(&self) -> Result<HashMap<&str, &Value>, Error> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for prop in &self.entries {
            if map.insert(prop.name.as_str(), &prop.value).is_some() {
                return Err(Error::Format(format!(
                    "duplicate property '{}' where a single value was expected",
                    prop.name
                )));
            }
        }
        Ok(map)
    }
}

impl<'a> IntoIterator for &'a PropertyTable {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn read_value(tag: &str, stream: &mut ByteStream, names: &NameTable) -> Result<Option<Value>, Error> {
    let value = match tag {
        "IntProperty" => Value::Int(stream.read_i32()?),
        "FloatProperty" => Value::Float(stream.read_f32()?),
        "StrProperty" => Value::Str(stream.read_string()?),
        "TextProperty" => Value::Text(stream.read_string()?),
        "NameProperty" => Value::Name(names.resolve(NameRef::read(stream)?)?),
        "ByteProperty" => {
            let enum_name = names.resolve(NameRef::read(stream)?)?;
            if enum_name == SENTINEL_NONE {
                Value::Byte(stream.read_u8()?)
            } else {
                let value = names.resolve(NameRef::read(stream)?)?;
                Value::Enum { enum_name, value }
            }
        }
        "StructProperty" => {
            let struct_type = names.resolve(NameRef::read(stream)?)?;
            let properties = PropertyTable::decode(stream, names)?;
            Value::Struct {
                struct_type,
                properties,
            }
        }
        "ArrayProperty" => {
            let inner_tag = names.resolve(NameRef::read(stream)?)?;
            let count = stream.read_u32()?;
            let mut values = Vec::with_capacity(stream.capacity_hint(count as usize, 1));
            for _ in 0..count {
                // Array elements carry no per-element size header; booleans
                // are stored as a payload byte here, unlike at top level.
                let element = if inner_tag == "BoolProperty" {
                    Value::Bool(stream.read_bool8()?)
                } else {
                    match read_value(&inner_tag, stream, names)? {
                        Some(v) => v,
                        // Element layout unknown: the caller skips the whole
                        // array by its declared size.
                        None => return Ok(None),
                    }
                };
                values.push(element);
            }
            Value::Array { inner_tag, values }
        }
        "ObjectProperty" => Value::Object(ObjectIndex(stream.read_i32()?)),
        _ => return Ok(None),
    };
    Ok(Some(value))
}
