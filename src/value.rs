//! Dynamically typed field values.

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

use crate::bytestr::ByteString;
use crate::descriptor::FieldType;
use crate::message::DynamicMessage;
use crate::utf8::cmp_utf16;

/// The value of a single field in a dynamic message.
///
/// Scalar variants correspond to the wire-level value categories; `List`
/// holds repeated fields and `Map` holds map fields as insertion-ordered
/// entries with unique keys.
///
/// Equality is protobuf equality: floats compare by bit pattern (so NaN
/// equals NaN and `0.0` differs from `-0.0`), bytes compare by content
/// regardless of storage shape, and maps compare as unordered mappings.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(ByteString),
    /// A numeric enum value, possibly outside the declared value set for
    /// open enums.
    Enum(i32),
    Message(DynamicMessage),
    List(Vec<Value>),
    Map(Vec<(MapKey, Value)>),
}

impl Value {
    /// The zero value for a scalar field type; `None` for message, group,
    /// and enum types (enum defaults depend on the enum descriptor).
    pub fn default_for(field_type: FieldType) -> Option<Value> {
        match field_type {
            FieldType::Double => Some(Value::F64(0.0)),
            FieldType::Float => Some(Value::F32(0.0)),
            FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => Some(Value::I32(0)),
            FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => Some(Value::I64(0)),
            FieldType::Uint32 | FieldType::Fixed32 => Some(Value::U32(0)),
            FieldType::Uint64 | FieldType::Fixed64 => Some(Value::U64(0)),
            FieldType::Bool => Some(Value::Bool(false)),
            FieldType::String => Some(Value::String(String::new())),
            FieldType::Bytes => Some(Value::Bytes(ByteString::new())),
            FieldType::Enum | FieldType::Message | FieldType::Group => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&ByteString> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            Value::Enum(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(MapKey, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Vec<(MapKey, Value)>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::I32(_) => 1,
            Value::I64(_) => 2,
            Value::U32(_) => 3,
            Value::U64(_) => 4,
            Value::F32(_) => 5,
            Value::F64(_) => 6,
            Value::String(_) => 7,
            Value::Bytes(_) => 8,
            Value::Enum(_) => 9,
            Value::Message(_) => 10,
            Value::List(_) => 11,
            Value::Map(_) => 12,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter()
                            .find(|(other_key, _)| other_key == key)
                            .is_some_and(|(_, other_value)| other_value == value)
                    })
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            Value::Bool(value) => value.hash(state),
            Value::I32(value) => value.hash(state),
            Value::I64(value) => value.hash(state),
            Value::U32(value) => value.hash(state),
            Value::U64(value) => value.hash(state),
            Value::F32(value) => value.to_bits().hash(state),
            Value::F64(value) => value.to_bits().hash(state),
            Value::String(value) => value.hash(state),
            Value::Bytes(value) => value.hash(state),
            Value::Enum(value) => value.hash(state),
            Value::Message(value) => value.hash(state),
            Value::List(values) => values.hash(state),
            Value::Map(entries) => {
                // Hash in key order so insertion order does not matter.
                let mut sorted: Vec<&(MapKey, Value)> = entries.iter().collect();
                sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
                for (key, value) in sorted {
                    key.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

/// The key of a map field entry.
///
/// Ordering is the deterministic-serialization order: numeric for integers,
/// `false < true` for booleans, and UTF-16 code unit order for strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl MapKey {
    /// The zero key for a map key field type; `None` for types that cannot
    /// key a map.
    pub fn default_for(field_type: FieldType) -> Option<MapKey> {
        match field_type {
            FieldType::Bool => Some(MapKey::Bool(false)),
            FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => Some(MapKey::I32(0)),
            FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => Some(MapKey::I64(0)),
            FieldType::Uint32 | FieldType::Fixed32 => Some(MapKey::U32(0)),
            FieldType::Uint64 | FieldType::Fixed64 => Some(MapKey::U64(0)),
            FieldType::String => Some(MapKey::String(String::new())),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            MapKey::Bool(_) => 0,
            MapKey::I32(_) => 1,
            MapKey::I64(_) => 2,
            MapKey::U32(_) => 3,
            MapKey::U64(_) => 4,
            MapKey::String(_) => 5,
        }
    }
}

impl Ord for MapKey {
    fn cmp(&self, other: &MapKey) -> Ordering {
        match (self, other) {
            (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
            (MapKey::I32(a), MapKey::I32(b)) => a.cmp(b),
            (MapKey::I64(a), MapKey::I64(b)) => a.cmp(b),
            (MapKey::U32(a), MapKey::U32(b)) => a.cmp(b),
            (MapKey::U64(a), MapKey::U64(b)) => a.cmp(b),
            (MapKey::String(a), MapKey::String(b)) => cmp_utf16(a, b),
            // Keys of one map always share a variant; fall back to the
            // variant tag for completeness.
            (a, b) => a.tag().cmp(&b.tag()),
        }
    }
}

impl PartialOrd for MapKey {
    fn partial_cmp(&self, other: &MapKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Value {
        match key {
            MapKey::Bool(value) => Value::Bool(value),
            MapKey::I32(value) => Value::I32(value),
            MapKey::I64(value) => Value::I64(value),
            MapKey::U32(value) => Value::U32(value),
            MapKey::U64(value) => Value::U64(value),
            MapKey::String(value) => Value::String(value),
        }
    }
}

impl TryFrom<Value> for MapKey {
    type Error = Value;

    fn try_from(value: Value) -> Result<MapKey, Value> {
        match value {
            Value::Bool(value) => Ok(MapKey::Bool(value)),
            Value::I32(value) => Ok(MapKey::I32(value)),
            Value::I64(value) => Ok(MapKey::I64(value)),
            Value::U32(value) => Ok(MapKey::U32(value)),
            Value::U64(value) => Ok(MapKey::U64(value)),
            Value::String(value) => Ok(MapKey::String(value)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_eq!(Value::F32(1.5), Value::F32(1.5));
    }

    #[test]
    fn bytes_equality_ignores_storage_shape() {
        let flat = Value::Bytes(ByteString::copy_from_slice(&[1u8; 300]));
        let rope = Value::Bytes(
            ByteString::copy_from_slice(&[1u8; 100])
                .concat(&ByteString::copy_from_slice(&[1u8; 200])),
        );
        assert_eq!(flat, rope);
    }

    #[test]
    fn map_equality_is_unordered() {
        let a = Value::Map(vec![
            (MapKey::I32(1), Value::String("one".into())),
            (MapKey::I32(2), Value::String("two".into())),
        ]);
        let b = Value::Map(vec![
            (MapKey::I32(2), Value::String("two".into())),
            (MapKey::I32(1), Value::String("one".into())),
        ]);
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        let hash = |v: &Value| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));

        let c = Value::Map(vec![(MapKey::I32(1), Value::String("one".into()))]);
        assert_ne!(a, c);
    }

    #[test]
    fn map_key_ordering() {
        assert!(MapKey::Bool(false) < MapKey::Bool(true));
        assert!(MapKey::I32(-5) < MapKey::I32(3));
        assert!(MapKey::U64(2) < MapKey::U64(10));
        assert!(MapKey::String("a".into()) < MapKey::String("b".into()));
        // UTF-16 code unit order: supplementary characters sort before
        // U+E000..U+FFFF.
        assert!(MapKey::String("\u{1F680}".into()) < MapKey::String("\u{FF61}".into()));
    }

    #[test]
    fn mismatched_variants_are_unequal() {
        assert_ne!(Value::I32(1), Value::I64(1));
        assert_ne!(Value::U32(0), Value::Bool(false));
    }
}
